use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use narratind::{run, validate_map, EventSink, RunOptions};
use narratind_core::{ConfigMode, Difficulty, SimConfig, StartingTrait};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless narratind simulation driver", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a game from a starting country
    Run(RunArgs),
    /// Check the built-in map data
    Validate {
        /// Country the reachability search starts from
        #[arg(long, default_value = "US")]
        start: String,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Starting country id
    #[arg(short, long)]
    start: String,

    /// Number of turns to run
    #[arg(short, long, default_value_t = 100)]
    turns: u64,

    /// RNG seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Balance preset
    #[arg(long, value_enum, default_value_t = ModeArg::Production)]
    mode: ModeArg,

    /// JSON config file; overrides --mode
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    difficulty: Option<DifficultyArg>,

    /// Start with extra wealth
    #[arg(long)]
    wealthy_start: bool,

    /// Write the event stream as JSONL to a file, or `-` for stdout
    #[arg(long)]
    events: Option<String>,

    /// Let the greedy player issue commands between turns
    #[arg(long)]
    autoplay: bool,

    /// Country ids to print every --watch-every turns
    #[arg(long, value_delimiter = ',')]
    watch: Vec<String>,

    #[arg(long, default_value_t = 10)]
    watch_every: u32,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Production,
    Testing,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DifficultyArg {
    Easy,
    Normal,
    Hard,
}

impl From<ModeArg> for ConfigMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Production => ConfigMode::Production,
            ModeArg::Testing => ConfigMode::Testing,
        }
    }
}

impl From<DifficultyArg> for Difficulty {
    fn from(difficulty: DifficultyArg) -> Self {
        match difficulty {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Normal => Difficulty::Normal,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = std::str::FromStr::from_str(&cli.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Run(args) => run_game(args),
        Commands::Validate { start } => {
            let check = validate_map(&start)?;
            println!(
                "{} countries, {:.2} neighbours on average, {} isolated, {} one-way links",
                check.countries, check.average_neighbors, check.isolated, check.asymmetric_links
            );
            println!(
                "{} of {} countries reachable from {}",
                check.reachable, check.countries, start
            );
            println!("Map OK");
            Ok(())
        }
    }
}

fn run_game(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_json_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => SimConfig::for_mode(args.mode.into()),
    };
    if let Some(difficulty) = args.difficulty {
        config = config.with_difficulty(difficulty.into());
    }

    let events = args.events.as_deref().map(EventSink::parse);
    let events_on_stdout = events == Some(EventSink::Stdout);
    let options = RunOptions {
        start: args.start,
        turns: args.turns,
        seed: args.seed,
        config,
        starting_trait: args.wealthy_start.then_some(StartingTrait::WealthyStart),
        events,
        autoplay: args.autoplay,
        watch: args.watch,
        watch_every: args.watch_every,
    };

    log::info!(
        "Starting narratind in {} for {} turns (seed {})",
        options.start,
        options.turns,
        options.seed
    );
    let summary = run(&options)?;

    let line = format!(
        "Turn {} | {}: believers {}/{} | apostates {} | infected {}/{} | wealth {:.2} | {} commands",
        summary.turns,
        summary.outcome(),
        summary.total_believers,
        summary.total_population,
        summary.total_apostates,
        summary.infected,
        summary.countries,
        summary.wealth,
        summary.commands_issued
    );
    // Keep stdout pure JSONL when the event stream goes there.
    if events_on_stdout {
        log::info!("{}", line);
    } else {
        println!("{}", line);
    }
    Ok(())
}
