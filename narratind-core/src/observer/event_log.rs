//! Event log observer for recording the simulation event stream as JSONL.
//!
//! `process_turn` and the command surface return [`GameEvent`] values; this
//! observer writes each one as a JSON line to any `Write` destination
//! (stdout, file, pipe).
//!
//! # Events
//!
//! - `game_started` / `trait_selected` - setup commands
//! - `country_event` - one fired country event (self-spread, real help, ...)
//! - `skill_unlocked` - a skill was bought
//! - `opponent_*` - philosopher lifecycle transitions
//! - `special_event_*` - good-person displays, claims and expiries
//! - `victory` / `defeat` - terminal transitions, emitted once

use super::{ObserverConfig, ObserverError, SimObserver, Snapshot};
use crate::events::EventRecord;
use crate::skills::SkillId;
use crate::state::{CountryId, PhilosopherId, SpecialEventId, StartingTrait};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Everything the simulation reports to the outside world.
///
/// Uses serde's tag format for clean JSONL output:
/// ```json
/// {"type":"opponent_appeared","turn":12,"philosopher":0,"name":"Kant",...}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted {
        turn: u64,
        country: CountryId,
        believers: u64,
    },

    TraitSelected {
        turn: u64,
        starting_trait: StartingTrait,
        /// Wealth credited when the game starts
        bonus_wealth: f64,
    },

    /// A per-country event fired during the spread phase.
    CountryEvent(EventRecord),

    SkillUnlocked {
        turn: u64,
        skill: SkillId,
        cost: f64,
        /// Wealth remaining after the purchase
        wealth: f64,
    },

    OpponentAppeared {
        turn: u64,
        philosopher: PhilosopherId,
        name: String,
        country: CountryId,
        health: i64,
    },

    /// A click failed; the philosopher grew tougher.
    OpponentResisted {
        turn: u64,
        philosopher: PhilosopherId,
        name: String,
        country: CountryId,
        health: i64,
        max_health: i64,
        /// Set when an invading philosopher fled
        #[serde(skip_serializing_if = "Option::is_none")]
        escaped_to: Option<CountryId>,
    },

    /// A click landed but the philosopher survived.
    OpponentDamaged {
        turn: u64,
        philosopher: PhilosopherId,
        name: String,
        country: CountryId,
        damage: i64,
        health: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        migrated_to: Option<CountryId>,
    },

    OpponentDestroyed {
        turn: u64,
        philosopher: PhilosopherId,
        name: String,
        country: CountryId,
        /// The identity cannot reappear before this turn
        disabled_until: u64,
    },

    /// The philosopher outlived its display and created apostates.
    OpponentTimedOut {
        turn: u64,
        philosopher: PhilosopherId,
        name: String,
        country: CountryId,
        believers_lost: u64,
        health: i64,
        max_health: i64,
    },

    OpponentInvaded {
        turn: u64,
        philosopher: PhilosopherId,
        name: String,
        from: CountryId,
        to: CountryId,
    },

    SpecialEventAppeared {
        turn: u64,
        event: SpecialEventId,
        country: CountryId,
        expires_turn: u64,
        crowned: bool,
    },

    SpecialEventClaimed {
        turn: u64,
        event: SpecialEventId,
        country: CountryId,
        believers_gained: u64,
        apostates_restored: u64,
    },

    SpecialEventExpired {
        turn: u64,
        event: SpecialEventId,
        country: CountryId,
    },

    Victory {
        turn: u64,
        total_believers: u64,
    },

    Defeat {
        turn: u64,
        infected_apostates: u64,
    },
}

impl GameEvent {
    /// Turn the event happened on.
    pub fn turn(&self) -> u64 {
        match self {
            GameEvent::CountryEvent(record) => record.turn,
            GameEvent::GameStarted { turn, .. }
            | GameEvent::TraitSelected { turn, .. }
            | GameEvent::SkillUnlocked { turn, .. }
            | GameEvent::OpponentAppeared { turn, .. }
            | GameEvent::OpponentResisted { turn, .. }
            | GameEvent::OpponentDamaged { turn, .. }
            | GameEvent::OpponentDestroyed { turn, .. }
            | GameEvent::OpponentTimedOut { turn, .. }
            | GameEvent::OpponentInvaded { turn, .. }
            | GameEvent::SpecialEventAppeared { turn, .. }
            | GameEvent::SpecialEventClaimed { turn, .. }
            | GameEvent::SpecialEventExpired { turn, .. }
            | GameEvent::Victory { turn, .. }
            | GameEvent::Defeat { turn, .. } => *turn,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GameEvent::Victory { .. } | GameEvent::Defeat { .. })
    }
}

/// Observer that writes every event it is handed as one JSON line.
pub struct EventLogObserver {
    /// Destination for JSONL output
    writer: Mutex<Box<dyn Write + Send>>,
    config: ObserverConfig,
}

impl EventLogObserver {
    /// Create observer writing to stdout.
    ///
    /// Useful for piping to tools like `jq`.
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(std::io::stdout())))
    }

    /// Create observer writing to a file.
    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    /// Create observer with a custom writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            config: ObserverConfig {
                frequency: 1,
                notify_on_conclusion: true,
            },
        }
    }

    fn write_event(&self, writer: &mut dyn Write, event: &GameEvent) -> Result<(), ObserverError> {
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
        Ok(())
    }
}

impl SimObserver for EventLogObserver {
    fn on_turn(&self, _snapshot: &Snapshot) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_turn_with_events(
        &self,
        _snapshot: &Snapshot,
        events: &[GameEvent],
    ) -> Result<(), ObserverError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ObserverError::Render("EventLogObserver writer lock poisoned".into()))?;
        for event in events {
            self.write_event(&mut **writer, event)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn needs_events(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "EventLogObserver"
    }

    fn config(&self) -> ObserverConfig {
        self.config.clone()
    }

    fn on_shutdown(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
