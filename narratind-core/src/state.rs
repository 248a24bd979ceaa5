use crate::skills::SkillSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Two-letter country code, e.g. `"US"`.
pub type CountryId = String;

pub type PhilosopherId = u32;

pub type SpecialEventId = u32;

/// A country on the map: immutable reference data plus mutable belief state.
///
/// Belief counters are only changed through the clamping helpers below so that
/// `believers + apostates <= population` holds after every call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Country {
    pub id: CountryId,
    pub population: u64,
    /// 1 (poorest) to 10 (richest).
    pub wealth_level: u8,
    /// Current GDP in trillions.
    pub gdp: f64,
    /// Baseline GDP derived from the wealth level.
    pub original_gdp: f64,
    pub neighbors: Vec<CountryId>,
    pub has_airport: bool,
    pub has_port: bool,
    pub believers: u64,
    pub apostates: u64,
    /// Set once, never cleared.
    pub infected: bool,
    /// Set when a drain skill pushed GDP below the wealth floor.
    pub floor_broken: bool,
}

impl Country {
    pub fn believer_ratio(&self) -> f64 {
        if self.population == 0 {
            0.0
        } else {
            self.believers as f64 / self.population as f64
        }
    }

    pub fn gdp_ratio(&self) -> f64 {
        if self.original_gdp <= 0.0 {
            0.0
        } else {
            self.gdp / self.original_gdp
        }
    }

    /// People who are neither believers nor apostates.
    pub fn non_believers(&self) -> u64 {
        self.population
            .saturating_sub(self.believers)
            .saturating_sub(self.apostates)
    }

    /// Upper bound for believers: `population - apostates`.
    pub fn believer_capacity(&self) -> u64 {
        self.population.saturating_sub(self.apostates)
    }

    pub fn is_fully_converted(&self) -> bool {
        self.non_believers() == 0
    }

    pub fn is_wealthy(&self) -> bool {
        self.wealth_level >= 7
    }

    pub fn is_poor(&self) -> bool {
        self.wealth_level <= 3
    }

    pub fn wealth_floor(&self, min_wealth_ratio: f64) -> f64 {
        self.original_gdp * min_wealth_ratio
    }

    /// Adds up to `amount` believers; returns the amount actually added.
    pub fn add_believers(&mut self, amount: u64) -> u64 {
        let applied = amount.min(self.non_believers());
        self.believers += applied;
        applied
    }

    /// Returns believers to the non-believer pool; returns the amount removed.
    pub fn remove_believers(&mut self, amount: u64) -> u64 {
        let applied = amount.min(self.believers);
        self.believers -= applied;
        applied
    }

    /// Turns believers into apostates; returns the amount converted.
    pub fn convert_to_apostates(&mut self, amount: u64) -> u64 {
        let applied = amount.min(self.believers);
        self.believers -= applied;
        self.apostates += applied;
        applied
    }

    /// Turns apostates back into believers; returns the amount restored.
    pub fn restore_apostates(&mut self, amount: u64) -> u64 {
        let applied = amount.min(self.apostates);
        self.apostates -= applied;
        self.believers += applied;
        applied
    }
}

/// Lifecycle of a philosopher entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhilosopherPhase {
    /// Registered but not displayed.
    Dormant,
    /// Displayed in its current country until `deadline_turn`.
    Active { since_turn: u64, deadline_turn: u64 },
}

/// An opponent entity contesting the spread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Philosopher {
    pub id: PhilosopherId,
    pub name: String,
    pub country: CountryId,
    /// Country it first appeared in; escape target when invading.
    pub home_country: CountryId,
    pub health: i64,
    pub max_health: i64,
    /// Apostates created so far. Never decreases.
    pub reputation: u64,
    pub resist_count: u32,
    pub is_invading: bool,
    pub phase: PhilosopherPhase,
}

impl Philosopher {
    pub fn is_active(&self) -> bool {
        matches!(self.phase, PhilosopherPhase::Active { .. })
    }

    pub fn deadline(&self) -> Option<u64> {
        match self.phase {
            PhilosopherPhase::Active { deadline_turn, .. } => Some(deadline_turn),
            PhilosopherPhase::Dormant => None,
        }
    }
}

/// A displayed "good person" event waiting to be claimed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecialEvent {
    pub id: SpecialEventId,
    pub country: CountryId,
    pub spawned_turn: u64,
    pub expires_turn: u64,
}

/// Optional bonus chosen before the game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartingTrait {
    /// Start with extra global wealth.
    WealthyStart,
}

impl StartingTrait {
    pub fn bonus_wealth(self) -> f64 {
        match self {
            StartingTrait::WealthyStart => 6.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalState {
    /// Maintained sum of believers over all countries.
    pub total_believers: u64,
    /// Sum of populations, fixed at construction.
    pub total_population: u64,
    pub wealth: f64,
    pub turn: u64,
    pub started: bool,
    pub start_country: Option<CountryId>,
    pub starting_trait: Option<StartingTrait>,
    pub victory: bool,
    pub defeat: bool,
}

impl GlobalState {
    pub fn is_concluded(&self) -> bool {
        self.victory || self.defeat
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorldState {
    /// Sorted by id so iteration order is stable across runs.
    pub countries: BTreeMap<CountryId, Country>,
    pub global: GlobalState,
    pub skills: SkillSet,
    pub philosophers: BTreeMap<PhilosopherId, Philosopher>,
    /// Philosopher name -> turn until which it cannot reappear.
    pub disabled_identities: BTreeMap<String, u64>,
    pub next_philosopher_id: PhilosopherId,
    pub special_events: BTreeMap<SpecialEventId, SpecialEvent>,
    pub next_special_event_id: SpecialEventId,
    pub rng_seed: u64,
}

impl WorldState {
    /// Builds a state from registry countries and fixes the population total.
    pub fn from_countries(countries: impl IntoIterator<Item = Country>) -> Self {
        let countries: BTreeMap<_, _> = countries.into_iter().map(|c| (c.id.clone(), c)).collect();
        let mut state = Self {
            countries,
            ..Default::default()
        };
        state.recompute_totals();
        state
    }

    /// Recomputes the maintained sums from per-country values.
    pub fn recompute_totals(&mut self) {
        self.global.total_population = self.countries.values().map(|c| c.population).sum();
        self.global.total_believers = self.countries.values().map(|c| c.believers).sum();
    }

    pub fn country(&self, id: &str) -> Option<&Country> {
        self.countries.get(id)
    }

    pub fn infected_ids(&self) -> Vec<CountryId> {
        self.countries
            .values()
            .filter(|c| c.infected)
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn total_apostates(&self) -> u64 {
        self.countries.values().map(|c| c.apostates).sum()
    }

    pub fn infected_believers(&self) -> u64 {
        self.countries
            .values()
            .filter(|c| c.infected)
            .map(|c| c.believers)
            .sum()
    }

    pub fn infected_apostates(&self) -> u64 {
        self.countries
            .values()
            .filter(|c| c.infected)
            .map(|c| c.apostates)
            .sum()
    }

    pub fn global_believer_ratio(&self) -> f64 {
        if self.global.total_population == 0 {
            0.0
        } else {
            self.global.total_believers as f64 / self.global.total_population as f64
        }
    }

    /// Clamped believer gain for a country, credited to the global total.
    pub fn add_believers(&mut self, id: &str, amount: u64) -> u64 {
        let Some(country) = self.countries.get_mut(id) else {
            return 0;
        };
        let applied = country.add_believers(amount);
        self.global.total_believers += applied;
        applied
    }

    pub fn remove_believers(&mut self, id: &str, amount: u64) -> u64 {
        let Some(country) = self.countries.get_mut(id) else {
            return 0;
        };
        let applied = country.remove_believers(amount);
        self.global.total_believers -= applied;
        applied
    }

    pub fn convert_to_apostates(&mut self, id: &str, amount: u64) -> u64 {
        let Some(country) = self.countries.get_mut(id) else {
            return 0;
        };
        let applied = country.convert_to_apostates(amount);
        self.global.total_believers -= applied;
        applied
    }

    pub fn restore_apostates(&mut self, id: &str, amount: u64) -> u64 {
        let Some(country) = self.countries.get_mut(id) else {
            return 0;
        };
        let applied = country.restore_apostates(amount);
        self.global.total_believers += applied;
        applied
    }

    /// Marks a country infected and seeds believers. Returns the seeded amount,
    /// or `None` when the country is unknown or already infected.
    pub fn infect(&mut self, id: &str, initial_believers: u64) -> Option<u64> {
        let country = self.countries.get_mut(id)?;
        if country.infected {
            return None;
        }
        country.infected = true;
        let applied = country.add_believers(initial_believers);
        self.global.total_believers += applied;
        Some(applied)
    }

    /// Whether a country already hosts an active philosopher.
    pub fn has_active_philosopher(&self, id: &str) -> bool {
        self.philosophers
            .values()
            .any(|p| p.is_active() && p.country == id)
    }

    /// Computes a deterministic checksum of the simulation state.
    pub fn checksum(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        self.global.turn.hash(&mut hasher);
        self.global.total_believers.hash(&mut hasher);
        self.global.wealth.to_bits().hash(&mut hasher);
        self.global.victory.hash(&mut hasher);
        self.global.defeat.hash(&mut hasher);

        // BTreeMap iteration is already sorted by id
        for (id, c) in &self.countries {
            id.hash(&mut hasher);
            c.believers.hash(&mut hasher);
            c.apostates.hash(&mut hasher);
            c.infected.hash(&mut hasher);
            c.gdp.to_bits().hash(&mut hasher);
        }

        for (id, p) in &self.philosophers {
            id.hash(&mut hasher);
            p.country.hash(&mut hasher);
            p.health.hash(&mut hasher);
            p.max_health.hash(&mut hasher);
            p.reputation.hash(&mut hasher);
            p.is_active().hash(&mut hasher);
        }

        for skill in self.skills.unlocked() {
            skill.hash(&mut hasher);
        }

        hasher.finish()
    }
}
