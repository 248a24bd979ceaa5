use crate::ai::{VisiblePhilosopher, VisibleWorldState};
use crate::config::{ConfigError, SimConfig};
use crate::events::EventTable;
use crate::input::Command;
use crate::metrics::SimMetrics;
use crate::observer::event_log::GameEvent;
use crate::observer::Snapshot;
use crate::opponents::{self, OpponentError};
use crate::registry::{CountryRegistry, RegistryError};
use crate::skills::SkillError;
use crate::special::{self, SpecialEventError};
use crate::state::{Country, CountryId, WorldState};
use crate::systems;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ActionError {
    #[error("Unknown country: {0}")]
    UnknownCountry(CountryId),
    #[error("The game has not started")]
    NotStarted,
    #[error("The game has already started")]
    AlreadyStarted,
    #[error("The game is over")]
    GameConcluded,
    #[error(transparent)]
    Skill(#[from] SkillError),
    #[error(transparent)]
    Opponent(#[from] OpponentError),
    #[error(transparent)]
    SpecialEvent(#[from] SpecialEventError),
}

/// Errors raised while building a [`Simulation`].
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid map: {0}")]
    Registry(#[from] RegistryError),
}

/// Invoked once with the final state when the game concludes.
pub type ConclusionCallback = Box<dyn FnMut(&WorldState)>;

/// Owns the world, the configuration and the random stream.
///
/// Everything that mutates the world goes through `&mut self`, so turn
/// processing, opponent checks and player commands never interleave.
pub struct Simulation {
    state: WorldState,
    config: SimConfig,
    rng: StdRng,
    table: EventTable,
    metrics: SimMetrics,
    on_victory: Option<ConclusionCallback>,
    on_defeat: Option<ConclusionCallback>,
}

impl Simulation {
    /// Validates `config` and takes ownership of `state`.
    pub fn new(mut state: WorldState, config: SimConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        state.rng_seed = seed;
        Ok(Self {
            state,
            config,
            rng: StdRng::seed_from_u64(seed),
            table: EventTable::standard(),
            metrics: SimMetrics::default(),
            on_victory: None,
            on_defeat: None,
        })
    }

    /// Simulation over the embedded world table.
    pub fn with_builtin_map(config: SimConfig, seed: u64) -> Result<Self, SetupError> {
        let registry = CountryRegistry::builtin()?;
        Ok(Self::new(registry.world_state(), config, seed)?)
    }

    pub fn set_victory_callback(&mut self, callback: impl FnMut(&WorldState) + 'static) {
        self.on_victory = Some(Box::new(callback));
    }

    pub fn set_defeat_callback(&mut self, callback: impl FnMut(&WorldState) + 'static) {
        self.on_defeat = Some(Box::new(callback));
    }

    /// Seeds `country` and starts the game.
    ///
    /// Returns false (and changes nothing) for an unknown country or when the
    /// game is already running.
    pub fn start_game(&mut self, country: &str) -> bool {
        if self.state.global.started {
            log::warn!("start_game({}) ignored: game already started", country);
            return false;
        }
        if self.state.country(country).is_none() {
            log::error!("Cannot start game in unknown country {}", country);
            return false;
        }

        let initial = self.config.game_start.initial_believers;
        let seeded = self.state.infect(country, initial).unwrap_or(0);
        if let Some(starting_trait) = self.state.global.starting_trait {
            self.state.global.wealth += starting_trait.bonus_wealth();
        }
        self.state.global.started = true;
        self.state.global.start_country = Some(country.to_string());
        log::info!("Game started in {} with {} believers", country, seeded);
        true
    }

    /// Advances one turn and returns everything that happened.
    ///
    /// Returns an empty list without touching the state when the game has
    /// not started or has concluded.
    pub fn process_turn(&mut self) -> Vec<GameEvent> {
        if !self.state.global.started || self.state.global.is_concluded() {
            return Vec::new();
        }
        let turn_start = Instant::now();
        self.state.global.turn += 1;
        let turn = self.state.global.turn;

        // 1. Country events
        let start = Instant::now();
        let mut events: Vec<GameEvent> =
            systems::run_spread_tick(&mut self.state, &self.config, &self.table, &mut self.rng)
                .into_iter()
                .map(GameEvent::CountryEvent)
                .collect();
        self.metrics.spread_time += start.elapsed();

        // 2. Economy
        let start = Instant::now();
        systems::run_wealth_transfer(&mut self.state, &self.config);
        systems::run_apostate_regeneration(&mut self.state, &self.config);
        self.metrics.economy_time += start.elapsed();

        // 3. Opponents
        let interval = self.config.opponents.check_interval.max(1) as u64;
        if turn % interval == 0 {
            events.extend(self.check_opponents());
        }

        // 4. Special events
        let interval = self.config.special_events.check_interval.max(1) as u64;
        if turn % interval == 0 {
            events.extend(self.check_special_events());
        }

        // 5. Victory / defeat
        events.extend(self.check_conclusion());

        self.metrics.total_turns += 1;
        self.metrics.events_emitted += events.len() as u64;
        self.metrics.total_time += turn_start.elapsed();
        log::debug!("Turn {} produced {} events", turn, events.len());
        events
    }

    /// Runs one opponent check cycle.
    ///
    /// Called by `process_turn` on the configured interval; drivers that want
    /// an offset cycle may call it directly between turns.
    pub fn check_opponents(&mut self) -> Vec<GameEvent> {
        if !self.state.global.started || self.state.global.is_concluded() {
            return Vec::new();
        }
        let start = Instant::now();
        let events = opponents::run_opponent_check(&mut self.state, &self.config, &mut self.rng);
        self.metrics.opponent_time += start.elapsed();
        events
    }

    pub fn check_special_events(&mut self) -> Vec<GameEvent> {
        if !self.state.global.started || self.state.global.is_concluded() {
            return Vec::new();
        }
        let start = Instant::now();
        let events = special::run_special_event_check(&mut self.state, &self.config, &mut self.rng);
        self.metrics.special_event_time += start.elapsed();
        events
    }

    /// Sets the terminal flag and fires its callback. Each can happen once
    /// since a concluded game never gets here again.
    fn check_conclusion(&mut self) -> Option<GameEvent> {
        let turn = self.state.global.turn;

        let all_infected = self.state.countries.values().all(|c| c.infected);
        if all_infected && self.state.global.total_believers >= self.state.global.total_population {
            self.state.global.victory = true;
            log::info!("Victory on turn {}", turn);
            if let Some(callback) = self.on_victory.as_mut() {
                callback(&self.state);
            }
            return Some(GameEvent::Victory {
                turn,
                total_believers: self.state.global.total_believers,
            });
        }

        let infected_apostates = self.state.infected_apostates();
        if self.state.infected_believers() == 0
            && infected_apostates > self.config.defeat_apostate_threshold
        {
            self.state.global.defeat = true;
            log::info!("Defeat on turn {}", turn);
            if let Some(callback) = self.on_defeat.as_mut() {
                callback(&self.state);
            }
            return Some(GameEvent::Defeat {
                turn,
                infected_apostates,
            });
        }

        None
    }

    /// Applies one player command.
    ///
    /// A command that completes the victory or defeat condition concludes the
    /// game immediately; the terminal event follows the command's own event.
    pub fn execute(&mut self, command: Command) -> Result<Vec<GameEvent>, ActionError> {
        let turn = self.state.global.turn;
        let setup = command.is_setup();
        if setup {
            if self.state.global.started {
                return Err(ActionError::AlreadyStarted);
            }
        } else if !self.state.global.started {
            return Err(ActionError::NotStarted);
        } else if self.state.global.is_concluded() {
            return Err(ActionError::GameConcluded);
        }

        let event = match command {
            Command::SelectTrait { starting_trait } => {
                self.state.global.starting_trait = Some(starting_trait);
                GameEvent::TraitSelected {
                    turn,
                    starting_trait,
                    bonus_wealth: starting_trait.bonus_wealth(),
                }
            }
            Command::StartGame { country } => {
                if !self.start_game(&country) {
                    return Err(ActionError::UnknownCountry(country));
                }
                let believers = self.state.country(&country).map_or(0, |c| c.believers);
                GameEvent::GameStarted {
                    turn,
                    country,
                    believers,
                }
            }
            Command::UnlockSkill { skill } => {
                let cost = self.state.skills.unlock(
                    skill,
                    &mut self.state.global.wealth,
                    &self.config.skills,
                )?;
                GameEvent::SkillUnlocked {
                    turn,
                    skill,
                    cost,
                    wealth: self.state.global.wealth,
                }
            }
            Command::AttackOpponent { philosopher } => {
                opponents::attack(&mut self.state, &self.config, philosopher, &mut self.rng)?
            }
            Command::ClaimSpecialEvent { event } => {
                special::claim(&mut self.state, &self.config, event)?
            }
        };

        let mut events = vec![event];
        if !setup {
            events.extend(self.check_conclusion());
        }
        Ok(events)
    }

    /// Commands that would currently succeed or have a chance to.
    pub fn available_commands(&self) -> Vec<Command> {
        if !self.state.global.started || self.state.global.is_concluded() {
            return Vec::new();
        }
        let mut commands: Vec<Command> = self
            .state
            .philosophers
            .values()
            .filter(|p| p.is_active())
            .map(|p| Command::AttackOpponent { philosopher: p.id })
            .collect();
        commands.extend(
            self.state
                .special_events
                .keys()
                .map(|&event| Command::ClaimSpecialEvent { event }),
        );
        commands.extend(
            crate::skills::SkillId::ALL
                .iter()
                .filter(|&&skill| {
                    self.state
                        .skills
                        .can_unlock(skill, self.state.global.wealth, &self.config.skills)
                })
                .map(|&skill| Command::UnlockSkill { skill }),
        );
        commands
    }

    /// What a scripted player gets to see.
    pub fn visible_state(&self) -> VisibleWorldState {
        let state = &self.state;
        VisibleWorldState {
            turn: state.global.turn,
            wealth: state.global.wealth,
            global_believer_ratio: state.global_believer_ratio(),
            infected_countries: state.countries.values().filter(|c| c.infected).count(),
            total_countries: state.countries.len(),
            philosophers: state
                .philosophers
                .values()
                .filter_map(|p| {
                    Some(VisiblePhilosopher {
                        id: p.id,
                        name: p.name.clone(),
                        country: p.country.clone(),
                        health: p.health,
                        max_health: p.max_health,
                        is_invading: p.is_invading,
                        click_chance: opponents::click_success_chance(state, &self.config, p.id),
                        deadline_turn: p.deadline()?,
                    })
                })
                .collect(),
            special_events: state.special_events.values().cloned().collect(),
            unlocked: state.skills.unlocked().collect(),
        }
    }

    pub fn country(&self, id: &str) -> Option<&Country> {
        self.state.country(id)
    }

    pub fn infected_countries(&self) -> Vec<&Country> {
        self.state.countries.values().filter(|c| c.infected).collect()
    }

    pub fn total_believers(&self) -> u64 {
        self.state.global.total_believers
    }

    pub fn total_apostates(&self) -> u64 {
        self.state.total_apostates()
    }

    pub fn total_population(&self) -> u64 {
        self.state.global.total_population
    }

    pub fn wealth(&self) -> f64 {
        self.state.global.wealth
    }

    pub fn turn(&self) -> u64 {
        self.state.global.turn
    }

    pub fn is_concluded(&self) -> bool {
        self.state.global.is_concluded()
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut SimMetrics {
        &mut self.metrics
    }

    /// Read-only copy of the current state for observers and debugging.
    pub fn snapshot(&self) -> Snapshot {
        let turn = self.state.global.turn;
        let frequency = self.config.checksum_frequency as u64;
        let checksum = if frequency > 0 && turn % frequency == 0 {
            self.state.checksum()
        } else {
            0
        };
        Snapshot::new(self.state.clone(), turn, checksum)
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
