//! Observer pattern for simulation state inspection.
//!
//! Observers receive immutable snapshots wrapped in `Arc` and the events the
//! turn produced. They cannot affect the simulation.
//!
//! # Architecture
//!
//! ```text
//! SimObserver trait
//!        │
//!        ├── EventLogObserver (JSONL event stream)
//!        └── ConsoleObserver (per-turn summary)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut registry = ObserverRegistry::new();
//! registry.register(Box::new(ConsoleObserver::new(&["US", "CN"])));
//!
//! // In the turn loop:
//! let events = sim.process_turn();
//! registry.notify_with_events(&sim.snapshot(), &events);
//! ```

pub mod console;
pub mod event_log;

use crate::state::WorldState;
use event_log::GameEvent;
use std::sync::Arc;
use thiserror::Error;

/// Immutable snapshot of simulation state for observers.
#[derive(Clone)]
pub struct Snapshot {
    pub state: Arc<WorldState>,
    /// Turn the snapshot was taken after
    pub turn: u64,
    /// State checksum (0 if disabled)
    pub checksum: u64,
}

impl Snapshot {
    pub fn new(state: WorldState, turn: u64, checksum: u64) -> Self {
        Self::from_arc(Arc::new(state), turn, checksum)
    }

    /// Create a snapshot from an already-wrapped Arc.
    pub fn from_arc(state: Arc<WorldState>, turn: u64, checksum: u64) -> Self {
        Self {
            state,
            turn,
            checksum,
        }
    }

    /// Whether the game had ended when the snapshot was taken.
    pub fn is_concluded(&self) -> bool {
        self.state.global.is_concluded()
    }
}

/// Errors that can occur during observation.
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Render error: {0}")]
    Render(String),
    /// The output behind the observer has gone away
    #[error("Observer disconnected")]
    Disconnected,
}

/// Configuration for observer notification frequency.
#[derive(Clone, Debug)]
pub struct ObserverConfig {
    /// Notify every N turns (1 = every turn)
    pub frequency: u32,
    /// Always notify on the turn the game reaches victory or defeat
    pub notify_on_conclusion: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            frequency: 1,
            notify_on_conclusion: true,
        }
    }
}

/// Trait for simulation observers.
///
/// Errors returned from `on_turn` are logged but do not block the simulation.
pub trait SimObserver: Send + Sync {
    /// Called after each turn (or as configured by frequency).
    fn on_turn(&self, snapshot: &Snapshot) -> Result<(), ObserverError>;

    /// Called instead of `on_turn` for observers that return `true` from
    /// `needs_events()`. Default delegates to `on_turn`.
    fn on_turn_with_events(
        &self,
        snapshot: &Snapshot,
        _events: &[GameEvent],
    ) -> Result<(), ObserverError> {
        self.on_turn(snapshot)
    }

    fn needs_events(&self) -> bool {
        false
    }

    /// Human-readable name for logging/debugging.
    fn name(&self) -> &str;

    fn config(&self) -> ObserverConfig {
        ObserverConfig::default()
    }

    /// Called when the simulation ends or the registry is dropped.
    fn on_shutdown(&self) {}
}

/// Registry for managing multiple observers.
pub struct ObserverRegistry {
    observers: Vec<Box<dyn SimObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self { observers: vec![] }
    }

    pub fn register(&mut self, observer: Box<dyn SimObserver>) {
        log::info!("Registered observer: {}", observer.name());
        self.observers.push(observer);
    }

    /// Notify all observers of a turn without event data.
    pub fn notify(&self, snapshot: &Snapshot) {
        self.notify_with_events(snapshot, &[])
    }

    /// Notify all observers of a turn with the events it produced.
    ///
    /// Errors are logged but do not propagate.
    pub fn notify_with_events(&self, snapshot: &Snapshot, events: &[GameEvent]) {
        let concluded = snapshot.is_concluded();
        for observer in &self.observers {
            let config = observer.config();
            let due = snapshot.turn % config.frequency.max(1) as u64 == 0;
            if !due && !(config.notify_on_conclusion && concluded) {
                continue;
            }

            let result = if observer.needs_events() {
                observer.on_turn_with_events(snapshot, events)
            } else {
                observer.on_turn(snapshot)
            };
            if let Err(e) = result {
                log::warn!("Observer '{}' error: {}", observer.name(), e);
            }
        }
    }

    pub fn shutdown(&self) {
        for observer in &self.observers {
            observer.on_shutdown();
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObserverRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
