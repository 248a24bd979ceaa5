//! Builders for constructing small worlds in tests.

use crate::registry::gdp_for_wealth_level;
use crate::skills::SkillId;
use crate::state::{Country, Philosopher, PhilosopherPhase, WorldState};

pub struct CountryBuilder {
    country: Country,
}

impl CountryBuilder {
    pub fn new(id: &str) -> Self {
        let gdp = gdp_for_wealth_level(5);
        Self {
            country: Country {
                id: id.to_string(),
                population: 1_000_000,
                wealth_level: 5,
                gdp,
                original_gdp: gdp,
                neighbors: Vec::new(),
                has_airport: false,
                has_port: false,
                believers: 0,
                apostates: 0,
                infected: false,
                floor_broken: false,
            },
        }
    }

    pub fn population(mut self, population: u64) -> Self {
        self.country.population = population;
        self
    }

    /// Sets the wealth level and resets both GDP values to the table value.
    pub fn wealth_level(mut self, level: u8) -> Self {
        self.country.wealth_level = level;
        self.country.original_gdp = gdp_for_wealth_level(level);
        self.country.gdp = self.country.original_gdp;
        self
    }

    pub fn gdp(mut self, gdp: f64) -> Self {
        self.country.gdp = gdp;
        self
    }

    pub fn original_gdp(mut self, gdp: f64) -> Self {
        self.country.original_gdp = gdp;
        self
    }

    pub fn neighbors(mut self, neighbors: &[&str]) -> Self {
        self.country.neighbors = neighbors.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn airport(mut self) -> Self {
        self.country.has_airport = true;
        self
    }

    pub fn port(mut self) -> Self {
        self.country.has_port = true;
        self
    }

    pub fn believers(mut self, believers: u64) -> Self {
        self.country.believers = believers;
        self
    }

    pub fn apostates(mut self, apostates: u64) -> Self {
        self.country.apostates = apostates;
        self
    }

    /// Marks the country infected with the given believer count.
    pub fn infected_with(mut self, believers: u64) -> Self {
        self.country.infected = true;
        self.country.believers = believers;
        self
    }

    pub fn build(self) -> Country {
        self.country
    }
}

pub struct WorldStateBuilder {
    state: WorldState,
}

impl WorldStateBuilder {
    pub fn new() -> Self {
        Self {
            state: WorldState::default(),
        }
    }

    pub fn with_country(mut self, country: CountryBuilder) -> Self {
        let country = country.build();
        self.state.countries.insert(country.id.clone(), country);
        self
    }

    pub fn wealth(mut self, wealth: f64) -> Self {
        self.state.global.wealth = wealth;
        self
    }

    pub fn turn(mut self, turn: u64) -> Self {
        self.state.global.turn = turn;
        self
    }

    pub fn started(mut self) -> Self {
        self.state.global.started = true;
        self
    }

    /// Unlocks a skill without paying for it.
    pub fn with_skill(mut self, skill: SkillId) -> Self {
        self.state.skills.force_unlock(skill);
        self
    }

    /// Adds an active philosopher with full health in `country`.
    pub fn with_philosopher(mut self, name: &str, country: &str, health: i64) -> Self {
        let id = self.state.next_philosopher_id;
        self.state.next_philosopher_id += 1;
        let turn = self.state.global.turn;
        self.state.philosophers.insert(
            id,
            Philosopher {
                id,
                name: name.to_string(),
                country: country.to_string(),
                home_country: country.to_string(),
                health,
                max_health: health,
                reputation: 0,
                resist_count: 0,
                is_invading: false,
                phase: PhilosopherPhase::Active {
                    since_turn: turn,
                    deadline_turn: turn + 5,
                },
            },
        );
        self
    }

    pub fn build(mut self) -> WorldState {
        self.state.recompute_totals();
        self.state
    }
}

impl Default for WorldStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
