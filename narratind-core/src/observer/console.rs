//! Console observer for terminal-based simulation monitoring.
//!
//! Prints a global summary line plus one line per watched country, with
//! believer deltas since the previous notification.

use super::{ObserverConfig, ObserverError, SimObserver, Snapshot};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Mutex;

pub struct ConsoleObserver {
    /// Country ids to watch
    ids: Vec<String>,
    writer: Mutex<Box<dyn Write + Send>>,
    /// Believer counts at the previous notification
    previous: Mutex<HashMap<String, u64>>,
    config: ObserverConfig,
}

impl ConsoleObserver {
    /// Create a console observer for the given country ids, writing to stdout.
    pub fn new(ids: &[&str]) -> Self {
        Self::with_writer(ids, Box::new(io::stdout()))
    }

    pub fn with_writer(ids: &[&str], writer: Box<dyn Write + Send>) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            writer: Mutex::new(writer),
            previous: Mutex::new(HashMap::new()),
            config: ObserverConfig::default(),
        }
    }

    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.config.frequency = frequency;
        self
    }
}

impl SimObserver for ConsoleObserver {
    fn on_turn(&self, snapshot: &Snapshot) -> Result<(), ObserverError> {
        let mut previous = self
            .previous
            .lock()
            .map_err(|_| ObserverError::Render("Lock poisoned".to_string()))?;
        let mut handle = self
            .writer
            .lock()
            .map_err(|_| ObserverError::Render("Lock poisoned".to_string()))?;

        let world = &snapshot.state;
        let global = &world.global;
        let infected = world.countries.values().filter(|c| c.infected).count();
        let active = world.philosophers.values().filter(|p| p.is_active()).count();
        writeln!(
            handle,
            "[turn {:>5}] believers {:>13} / {:>13} ({:>6.2}%) | apostates {:>11} | infected {:>3}/{:<3} | wealth {:>9.2} | philosophers {}",
            snapshot.turn,
            global.total_believers,
            global.total_population,
            world.global_believer_ratio() * 100.0,
            world.total_apostates(),
            infected,
            world.countries.len(),
            global.wealth,
            active,
        )?;

        for id in &self.ids {
            let Some(country) = world.country(id) else {
                writeln!(handle, "  {}: \x1b[31m[UNKNOWN]\x1b[0m", id)?;
                continue;
            };
            let before = previous.get(id).copied().unwrap_or(country.believers);
            let delta = country.believers as i64 - before as i64;
            writeln!(
                handle,
                "  {}: {:>12} ({}{:>+10}\x1b[0m) apostates {:>10} gdp {:>7.3}/{:<7.3}",
                id,
                country.believers,
                delta_color(delta),
                delta,
                country.apostates,
                country.gdp,
                country.original_gdp,
            )?;
            previous.insert(id.clone(), country.believers);
        }

        handle.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "ConsoleObserver"
    }

    fn config(&self) -> ObserverConfig {
        self.config.clone()
    }
}

/// Returns ANSI color code based on delta sign.
fn delta_color(delta: i64) -> &'static str {
    if delta > 0 {
        "\x1b[32m" // Green for gains
    } else if delta < 0 {
        "\x1b[31m" // Red for losses
    } else {
        "\x1b[90m"
    }
}
