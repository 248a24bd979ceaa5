//! Headless driver for the narratind simulation.
//!
//! Runs the turn loop at full speed, optionally lets the greedy player issue
//! commands between turns, and fans every turn out to the observers.

use anyhow::{bail, Context, Result};
use narratind_core::registry::connectivity;
use narratind_core::{
    AiPlayer, Command, ConsoleObserver, CountryRegistry, EventLogObserver, GameEvent, GreedyAI,
    ObserverRegistry, SimConfig, Simulation, StartingTrait,
};
use std::path::PathBuf;

/// Where the JSONL event stream goes.
#[derive(Debug, Clone, PartialEq)]
pub enum EventSink {
    Stdout,
    File(PathBuf),
}

impl EventSink {
    /// `-` means stdout, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            EventSink::Stdout
        } else {
            EventSink::File(PathBuf::from(value))
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub start: String,
    pub turns: u64,
    pub seed: u64,
    pub config: SimConfig,
    pub starting_trait: Option<StartingTrait>,
    pub events: Option<EventSink>,
    pub autoplay: bool,
    /// Country ids printed by the console observer
    pub watch: Vec<String>,
    pub watch_every: u32,
}

impl RunOptions {
    pub fn new(start: &str) -> Self {
        Self {
            start: start.to_string(),
            turns: 100,
            seed: 12345,
            config: SimConfig::production(),
            starting_trait: None,
            events: None,
            autoplay: false,
            watch: Vec::new(),
            watch_every: 10,
        }
    }
}

/// Final numbers of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub turns: u64,
    pub total_believers: u64,
    pub total_apostates: u64,
    pub total_population: u64,
    pub infected: usize,
    pub countries: usize,
    pub wealth: f64,
    pub victory: bool,
    pub defeat: bool,
    pub commands_issued: u64,
    pub events_emitted: u64,
}

impl RunSummary {
    pub fn outcome(&self) -> &'static str {
        if self.victory {
            "victory"
        } else if self.defeat {
            "defeat"
        } else {
            "undecided"
        }
    }
}

/// Runs one game from `options.start` until it concludes or the turn limit
/// is reached.
pub fn run(options: &RunOptions) -> Result<RunSummary> {
    let mut sim = Simulation::with_builtin_map(options.config.clone(), options.seed)
        .context("cannot set up simulation")?;

    let mut observers = ObserverRegistry::new();
    match &options.events {
        Some(EventSink::Stdout) => observers.register(Box::new(EventLogObserver::stdout())),
        Some(EventSink::File(path)) => observers.register(Box::new(
            EventLogObserver::file(path)
                .with_context(|| format!("cannot create event log {}", path.display()))?,
        )),
        None => {}
    }
    if !options.watch.is_empty() {
        let ids: Vec<&str> = options.watch.iter().map(String::as_str).collect();
        observers.register(Box::new(
            ConsoleObserver::new(&ids).with_frequency(options.watch_every),
        ));
    }

    let mut setup: Vec<GameEvent> = Vec::new();
    if let Some(starting_trait) = options.starting_trait {
        setup.extend(sim.execute(Command::SelectTrait { starting_trait })?);
    }
    setup.extend(
        sim.execute(Command::StartGame {
            country: options.start.clone(),
        })
        .with_context(|| format!("cannot start game in {}", options.start))?,
    );
    observers.notify_with_events(&sim.snapshot(), &setup);

    let mut player = GreedyAI::new();
    let mut commands_issued = 0;
    for _ in 0..options.turns {
        let mut events = sim.process_turn();
        if options.autoplay && !sim.is_concluded() {
            let visible = sim.visible_state();
            let available = sim.available_commands();
            for command in player.decide(&visible, &available) {
                match sim.execute(command) {
                    Ok(emitted) => {
                        commands_issued += 1;
                        events.extend(emitted);
                    }
                    Err(e) => log::warn!("{} command rejected: {}", player.name(), e),
                }
            }
        }

        observers.notify_with_events(&sim.snapshot(), &events);
        if sim.is_concluded() {
            break;
        }
    }
    observers.shutdown();

    let metrics = sim.metrics();
    log::info!(
        "Ran {} turns in {:.2?} ({:.0} turns/s, {:.3} ms/turn)",
        metrics.total_turns,
        metrics.total_time,
        metrics.turns_per_second(),
        metrics.turn_avg_ms()
    );

    Ok(RunSummary {
        turns: sim.turn(),
        total_believers: sim.total_believers(),
        total_apostates: sim.total_apostates(),
        total_population: sim.total_population(),
        infected: sim.infected_countries().len(),
        countries: sim.state().countries.len(),
        wealth: sim.wealth(),
        victory: sim.state().global.victory,
        defeat: sim.state().global.defeat,
        commands_issued,
        events_emitted: metrics.events_emitted,
    })
}

/// Result of checking the built-in map.
#[derive(Debug, Clone)]
pub struct MapCheck {
    pub countries: usize,
    pub asymmetric_links: usize,
    pub isolated: usize,
    pub average_neighbors: f64,
    pub reachable: usize,
}

/// Checks the built-in map: neighbour ids must exist, and reports how much of
/// the map is reachable from `start`.
pub fn validate_map(start: &str) -> Result<MapCheck> {
    let registry = CountryRegistry::builtin().context("failed to load built-in map")?;
    let report = registry.validate_adjacency();
    for (country, neighbor) in &report.unknown {
        log::error!("{} lists unknown neighbour {}", country, neighbor);
    }
    if !report.is_valid() {
        bail!("{} dangling neighbour references", report.unknown.len());
    }
    for (country, neighbor) in &report.asymmetric {
        log::debug!("One-way link {} -> {}", country, neighbor);
    }

    let state = registry.world_state();
    let Some(reach) = connectivity(&state, start) else {
        bail!("unknown country {}", start);
    };
    if !reach.is_fully_connected() {
        log::warn!(
            "{} countries unreachable from {}: {:?}",
            reach.unreachable.len(),
            start,
            reach.unreachable
        );
    }

    Ok(MapCheck {
        countries: state.countries.len(),
        asymmetric_links: report.asymmetric.len(),
        isolated: report.isolated.len(),
        average_neighbors: report.average_neighbors,
        reachable: reach.reachable,
    })
}
