use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accumulated timing metrics for turn processing.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct SimMetrics {
    pub total_turns: u64,
    pub total_time: Duration,
    pub spread_time: Duration,
    /// Wealth transfer and apostate regeneration combined
    pub economy_time: Duration,
    pub opponent_time: Duration,
    pub special_event_time: Duration,
    pub ai_time: Duration,
    /// Time spent in observers (event log, console)
    pub observer_time: Duration,
    /// Events emitted by `process_turn`
    pub events_emitted: u64,
}

impl SimMetrics {
    pub fn turn_avg_ms(&self) -> f64 {
        if self.total_turns == 0 {
            0.0
        } else {
            self.total_time.as_secs_f64() * 1000.0 / self.total_turns as f64
        }
    }

    pub fn turns_per_second(&self) -> f64 {
        if self.total_time.as_secs_f64() == 0.0 {
            0.0
        } else {
            self.total_turns as f64 / self.total_time.as_secs_f64()
        }
    }
}
