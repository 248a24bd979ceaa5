//! # Narratind Simulation Core
//!
//! Deterministic turn-based engine for a world-spread strategy game: a belief
//! spreads from one starting country across a map of real countries while
//! philosopher opponents turn believers into apostates.
//!
//! This crate implements the core game loop: state → commands → state
//! transitions. Given the same seed and the same commands, two runs produce
//! the same event stream and the same final state.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  AI Players │────▶│   Command    │────▶│  Simulation  │
//! │  (decide)   │     │  (execute)   │     │ process_turn │
//! └─────────────┘     └──────────────┘     └──────┬───────┘
//!                                                 │ GameEvent
//!                     ┌──────────────┐     ┌──────▼───────┐
//!                     │  Observers   │◀────│  WorldState  │
//!                     │  (side fx)   │     │  (snapshot)  │
//!                     └──────────────┘     └──────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Simulation`] | Owns state, config and RNG; runs turns and commands |
//! | [`WorldState`] | Countries, philosophers, special events, skills, totals |
//! | [`Command`] | Player actions (StartGame, UnlockSkill, AttackOpponent, ...) |
//! | [`GameEvent`] | Everything a turn or command reports |
//! | [`AiPlayer`] | Trait for scripted players |
//! | [`SimObserver`] | Trait for observing turns (event log, console) |
//!
//! ## Turn order
//!
//! 1. Country events (self-spread, attract, real help, cross-border,
//!    wealth drain, believer loss), evaluated against the turn-start state
//! 2. Economy: GDP → wealth transfer, apostate regeneration
//! 3. Opponent check cycle (every `opponents.check_interval` turns)
//! 4. Special-event check cycle (every `special_events.check_interval` turns)
//! 5. Victory / defeat

pub mod ai;
pub mod config;
pub mod crossborder;
pub mod events;
pub mod input;
pub mod metrics;
pub mod observer;
pub mod opponents;
pub mod registry;
pub mod skills;
pub mod special;
pub mod state;
pub mod step;
pub mod systems;
pub mod testing;

pub use ai::{AiPlayer, GreedyAI, RandomAi, VisibleWorldState};
pub use config::{ConfigError, ConfigMode, Difficulty, SimConfig};
pub use events::{EventKind, EventRecord};
pub use input::Command;
pub use metrics::SimMetrics;
pub use observer::console::ConsoleObserver;
pub use observer::event_log::{EventLogObserver, GameEvent};
pub use observer::{ObserverConfig, ObserverError, ObserverRegistry, SimObserver, Snapshot};
pub use registry::{CountryRegistry, RegistryError};
pub use skills::{SkillError, SkillId};
pub use state::{Country, CountryId, StartingTrait, WorldState};
pub use step::{ActionError, SetupError, Simulation};
