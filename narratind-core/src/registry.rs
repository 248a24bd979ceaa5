//! Country registry: the static world table and map-data checks.
//!
//! The built-in table is embedded as JSON. Each record carries population,
//! wealth level, land neighbours and airport/port flags; GDP is derived from
//! the wealth level via [`gdp_for_wealth_level`].

use crate::state::{Country, CountryId, WorldState};
use serde::{Deserialize, Serialize};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

pub const BUILTIN_COUNTRIES: &str = include_str!("../data/countries.json");

/// GDP (trillions) for wealth levels 1..=10.
const GDP_BY_WEALTH_LEVEL: [f64; 10] = [0.01, 0.02, 0.05, 0.1, 0.3, 0.8, 1.5, 3.0, 5.0, 28.0];

/// Baseline GDP for a wealth level. Levels outside 1..=10 are clamped.
pub fn gdp_for_wealth_level(level: u8) -> f64 {
    let index = level.clamp(1, 10) as usize - 1;
    GDP_BY_WEALTH_LEVEL[index]
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid country table JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate country id: {0}")]
    DuplicateId(CountryId),
    #[error("Country {id} has wealth level {level}, expected 1-10")]
    InvalidWealthLevel { id: CountryId, level: u8 },
}

/// One row of the static world table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountryRecord {
    pub id: CountryId,
    pub population: u64,
    pub wealth_level: u8,
    #[serde(default)]
    pub neighbors: Vec<CountryId>,
    #[serde(default)]
    pub airport: bool,
    #[serde(default)]
    pub port: bool,
}

/// Static world table.
#[derive(Debug, Clone)]
pub struct CountryRegistry {
    records: Vec<CountryRecord>,
}

impl CountryRegistry {
    /// Parses the embedded world table.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json_str(BUILTIN_COUNTRIES)
    }

    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let records: Vec<CountryRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn from_records(records: Vec<CountryRecord>) -> Result<Self, RegistryError> {
        let mut seen = FxHashSet::default();
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(RegistryError::DuplicateId(record.id.clone()));
            }
            // Uninhabited territories carry wealth level 0 and are skipped later.
            if record.population > 0 && !(1..=10).contains(&record.wealth_level) {
                return Err(RegistryError::InvalidWealthLevel {
                    id: record.id.clone(),
                    level: record.wealth_level,
                });
            }
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[CountryRecord] {
        &self.records
    }

    /// Builds playable countries. Zero-population entries are dropped, as are
    /// neighbour links pointing at them.
    pub fn countries(&self) -> Vec<Country> {
        let populated: FxHashSet<&str> = self
            .records
            .iter()
            .filter(|r| r.population > 0)
            .map(|r| r.id.as_str())
            .collect();

        self.records
            .iter()
            .filter(|record| {
                if record.population == 0 {
                    log::debug!("Skipping uninhabited territory {}", record.id);
                    return false;
                }
                true
            })
            .map(|record| {
                let gdp = gdp_for_wealth_level(record.wealth_level);
                Country {
                    id: record.id.clone(),
                    population: record.population,
                    wealth_level: record.wealth_level,
                    gdp,
                    original_gdp: gdp,
                    neighbors: record
                        .neighbors
                        .iter()
                        .filter(|n| populated.contains(n.as_str()))
                        .cloned()
                        .collect(),
                    has_airport: record.airport,
                    has_port: record.port,
                    believers: 0,
                    apostates: 0,
                    infected: false,
                    floor_broken: false,
                }
            })
            .collect()
    }

    /// Fresh world state with every populated country uninfected.
    pub fn world_state(&self) -> WorldState {
        let state = WorldState::from_countries(self.countries());
        log::info!(
            "Loaded {} countries (population {})",
            state.countries.len(),
            state.global.total_population
        );
        state
    }

    /// Checks neighbour references.
    ///
    /// Unknown ids are errors; one-way links are only warnings since the map
    /// does not require symmetric adjacency.
    pub fn validate_adjacency(&self) -> AdjacencyReport {
        let ids: FxHashSet<&str> = self.records.iter().map(|r| r.id.as_str()).collect();
        let by_id: FxHashMap<&str, &CountryRecord> =
            self.records.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut report = AdjacencyReport::default();
        for record in &self.records {
            if record.neighbors.is_empty() {
                report.isolated.push(record.id.clone());
            }
            for neighbor in &record.neighbors {
                if !ids.contains(neighbor.as_str()) {
                    report.unknown.push((record.id.clone(), neighbor.clone()));
                    continue;
                }
                let back = by_id
                    .get(neighbor.as_str())
                    .is_some_and(|n| n.neighbors.contains(&record.id));
                if !back {
                    report.asymmetric.push((record.id.clone(), neighbor.clone()));
                }
            }
        }

        let counts: Vec<usize> = self.records.iter().map(|r| r.neighbors.len()).collect();
        report.max_neighbors = counts.iter().copied().max().unwrap_or(0);
        report.average_neighbors = if counts.is_empty() {
            0.0
        } else {
            counts.iter().sum::<usize>() as f64 / counts.len() as f64
        };
        report
    }
}

/// Result of [`CountryRegistry::validate_adjacency`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdjacencyReport {
    /// `(country, neighbor)` pairs where the neighbor id does not exist.
    pub unknown: Vec<(CountryId, CountryId)>,
    /// `(country, neighbor)` pairs where the neighbor does not list the country.
    pub asymmetric: Vec<(CountryId, CountryId)>,
    /// Countries without land neighbours (islands, enclaves).
    pub isolated: Vec<CountryId>,
    pub max_neighbors: usize,
    pub average_neighbors: f64,
}

impl AdjacencyReport {
    pub fn is_valid(&self) -> bool {
        self.unknown.is_empty()
    }
}

/// Countries reachable in one hop: land neighbours, plus every other port
/// when `id` has a port and every other airport when it has an airport.
pub fn connected(countries: &BTreeMap<CountryId, Country>, id: &str) -> Vec<CountryId> {
    let Some(source) = countries.get(id) else {
        return Vec::new();
    };
    let mut links: BTreeSet<CountryId> = source
        .neighbors
        .iter()
        .filter(|n| countries.contains_key(n.as_str()))
        .cloned()
        .collect();
    for other in countries.values() {
        if other.id == source.id {
            continue;
        }
        if (source.has_port && other.has_port) || (source.has_airport && other.has_airport) {
            links.insert(other.id.clone());
        }
    }
    links.into_iter().collect()
}

/// Result of a breadth-first reachability search.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub start: CountryId,
    pub reachable: usize,
    pub total: usize,
    pub unreachable: Vec<CountryId>,
}

impl ConnectivityReport {
    pub fn is_fully_connected(&self) -> bool {
        self.unreachable.is_empty()
    }
}

/// Breadth-first search over land, sea and air links from `start`.
pub fn connectivity(state: &WorldState, start: &str) -> Option<ConnectivityReport> {
    if !state.countries.contains_key(start) {
        return None;
    }
    let mut seen: FxHashSet<CountryId> = FxHashSet::default();
    let mut queue = VecDeque::new();
    seen.insert(start.to_string());
    queue.push_back(start.to_string());

    while let Some(current) = queue.pop_front() {
        for next in connected(&state.countries, &current) {
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }

    let unreachable: Vec<CountryId> = state
        .countries
        .keys()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .collect();
    Some(ConnectivityReport {
        start: start.to_string(),
        reachable: seen.len(),
        total: state.countries.len(),
        unreachable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, population: u64, neighbors: &[&str]) -> CountryRecord {
        CountryRecord {
            id: id.to_string(),
            population,
            wealth_level: 5,
            neighbors: neighbors.iter().map(|s| s.to_string()).collect(),
            airport: false,
            port: false,
        }
    }

    #[test]
    fn test_gdp_table() {
        assert_eq!(gdp_for_wealth_level(1), 0.01);
        assert_eq!(gdp_for_wealth_level(10), 28.0);
        assert_eq!(gdp_for_wealth_level(0), 0.01);
        assert_eq!(gdp_for_wealth_level(12), 28.0);
    }

    #[test]
    fn test_builtin_table_loads() {
        let registry = CountryRegistry::builtin().unwrap();
        let state = registry.world_state();
        let us = state.country("US").unwrap();
        assert_eq!(us.wealth_level, 10);
        assert_eq!(us.original_gdp, 28.0);
        assert!(us.has_airport && us.has_port);
        assert!(state.countries.values().all(|c| c.population > 0));
        assert!(state.countries.values().all(|c| !c.infected));
        assert_eq!(state.global.total_believers, 0);
    }

    #[test]
    fn test_builtin_table_has_no_dangling_neighbors() {
        let report = CountryRegistry::builtin().unwrap().validate_adjacency();
        assert!(report.is_valid(), "unknown neighbors: {:?}", report.unknown);
    }

    #[test]
    fn test_builtin_map_is_connected() {
        let state = CountryRegistry::builtin().unwrap().world_state();
        let report = connectivity(&state, "US").unwrap();
        assert!(report.is_fully_connected(), "unreachable: {:?}", report.unreachable);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = CountryRegistry::from_records(vec![record("AA", 1, &[]), record("AA", 2, &[])])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(id) if id == "AA"));
    }

    #[test]
    fn test_zero_population_skipped() {
        let registry =
            CountryRegistry::from_records(vec![record("AA", 100, &["ZZ"]), record("ZZ", 0, &["AA"])])
                .unwrap();
        let countries = registry.countries();
        assert_eq!(countries.len(), 1);
        assert!(countries[0].neighbors.is_empty());
    }

    #[test]
    fn test_adjacency_report() {
        let registry = CountryRegistry::from_records(vec![
            record("AA", 10, &["BB", "QQ"]),
            record("BB", 10, &[]),
            record("CC", 10, &[]),
        ])
        .unwrap();
        let report = registry.validate_adjacency();
        assert_eq!(report.unknown, vec![("AA".to_string(), "QQ".to_string())]);
        assert_eq!(report.asymmetric, vec![("AA".to_string(), "BB".to_string())]);
        assert_eq!(report.isolated, vec!["BB".to_string(), "CC".to_string()]);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_connectivity_through_ports() {
        let mut a = record("AA", 10, &[]);
        a.port = true;
        let mut b = record("BB", 10, &[]);
        b.port = true;
        let c = record("CC", 10, &[]);
        let state = CountryRegistry::from_records(vec![a, b, c]).unwrap().world_state();

        assert_eq!(connected(&state.countries, "AA"), vec!["BB".to_string()]);
        let report = connectivity(&state, "AA").unwrap();
        assert_eq!(report.reachable, 2);
        assert_eq!(report.unreachable, vec!["CC".to_string()]);
        assert!(connectivity(&state, "XX").is_none());
    }
}
