//! Cross-border propagation.
//!
//! When a country's cross-border trigger fires, the resolver builds a
//! weighted candidate pool of uninfected countries, draws one, and rolls the
//! GDP-gap success rate. Spreading into a poorer or equal country always
//! succeeds; spreading upward decays exponentially with the gap.

use crate::config::CrossBorderConfig;
use crate::events::roll;
use crate::skills::{EffectType, ModifierContext};
use crate::state::{Country, CountryId, WorldState};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Land,
    Sea,
    Air,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: CountryId,
    pub route: Route,
    pub weight: f64,
}

/// Result of one resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CrossBorderOutcome {
    /// Nothing reachable is left uninfected.
    NoCandidates,
    Failed {
        target: CountryId,
        route: Route,
        success_rate: f64,
    },
    Infected {
        target: CountryId,
        route: Route,
        believers: u64,
    },
}

/// `1` for an equal or poorer target, otherwise
/// `max(min_success_rate, decay_base^((dest - src) / decay_scale))`.
pub fn success_rate(source_gdp: f64, dest_gdp: f64, cfg: &CrossBorderConfig) -> f64 {
    if dest_gdp <= source_gdp {
        return 1.0;
    }
    let gap = dest_gdp - source_gdp;
    cfg.decay_base
        .powf(gap / cfg.decay_scale)
        .max(cfg.min_success_rate)
}

/// Builds the candidate pool for `source`.
///
/// Land neighbours are always included. Ports and airports contribute a random
/// sample each. A country reachable several ways keeps its heaviest route.
pub fn candidate_pool(
    state: &WorldState,
    source: &Country,
    cfg: &CrossBorderConfig,
    rng: &mut dyn RngCore,
) -> Vec<Candidate> {
    let mut pool: BTreeMap<CountryId, Candidate> = BTreeMap::new();
    let mut offer = |id: &CountryId, route: Route, weight: f64| {
        let entry = pool.entry(id.clone()).or_insert(Candidate {
            id: id.clone(),
            route,
            weight,
        });
        if weight > entry.weight {
            entry.route = route;
            entry.weight = weight;
        }
    };

    for neighbor in &source.neighbors {
        if state.country(neighbor).is_some_and(|c| !c.infected) {
            offer(neighbor, Route::Land, cfg.land_weight);
        }
    }

    if source.has_port {
        let ports = open_countries(state, &source.id, |c| c.has_port);
        for c in ports.choose_multiple(rng, cfg.sea_sample_size) {
            offer(&c.id, Route::Sea, cfg.sea_weight);
        }
    }
    if source.has_airport {
        let airports = open_countries(state, &source.id, |c| c.has_airport);
        for c in airports.choose_multiple(rng, cfg.air_sample_size) {
            offer(&c.id, Route::Air, cfg.air_weight);
        }
    }

    pool.into_values().filter(|c| c.weight > 0.0).collect()
}

/// Uninfected countries other than `source` matching `pred`, in id order.
fn open_countries<'s>(
    state: &'s WorldState,
    source: &str,
    pred: fn(&Country) -> bool,
) -> Vec<&'s Country> {
    state
        .countries
        .values()
        .filter(|c| !c.infected && c.id != source && pred(c))
        .collect()
}

/// Picks a destination for `source_id` and tries to infect it.
///
/// Returns `None` when the source does not exist.
pub fn resolve(
    state: &mut WorldState,
    source_id: &str,
    cfg: &CrossBorderConfig,
    wealth_cutoff: f64,
    rng: &mut dyn RngCore,
) -> Option<CrossBorderOutcome> {
    let (target, route, rate) = {
        let source = state.country(source_id)?;
        let pool = candidate_pool(state, source, cfg, rng);
        let Ok(dist) = WeightedIndex::new(pool.iter().map(|c| c.weight)) else {
            log::debug!("{} has no cross-border candidates", source_id);
            return Some(CrossBorderOutcome::NoCandidates);
        };
        let pick = &pool[dist.sample(rng)];
        let target = state.country(&pick.id)?;

        let ctx = ModifierContext::new(state.global.wealth, wealth_cutoff).with_route(source, target);
        let bonus = state.skills.modifier(EffectType::PoorToRichSpread, &ctx);
        let rate = (success_rate(source.gdp, target.gdp, cfg) * bonus).clamp(0.0, 1.0);
        (pick.id.clone(), pick.route, rate)
    };

    if !roll(rng, rate) {
        log::debug!(
            "Cross-border spread {} -> {} via {:?} failed (rate {:.6})",
            source_id,
            target,
            route,
            rate
        );
        return Some(CrossBorderOutcome::Failed {
            target,
            route,
            success_rate: rate,
        });
    }

    let believers = state.infect(&target, cfg.initial_believers)?;
    log::info!("Belief spread from {} to {} by {:?}", source_id, target, route);
    Some(CrossBorderOutcome::Infected {
        target,
        route,
        believers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillId;
    use crate::testing::{CountryBuilder, WorldStateBuilder};
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_poorer_target_always_succeeds() {
        let cfg = CrossBorderConfig::default();
        assert_eq!(success_rate(28.0, 0.01, &cfg), 1.0);
        assert_eq!(success_rate(1.0, 1.0, &cfg), 1.0);
    }

    #[test]
    fn test_large_gap_is_near_impossible() {
        let cfg = CrossBorderConfig::default();
        let rate = success_rate(0.01, 28.0, &cfg);
        assert!(rate < 1e-4, "rate was {rate}");
        assert_eq!(rate, cfg.min_success_rate);
    }

    #[test]
    fn test_small_gap_decays_smoothly() {
        let cfg = CrossBorderConfig::default();
        let rate = success_rate(0.3, 0.8, &cfg);
        assert!((rate - 0.05_f64.powf(0.1)).abs() < 1e-12);
        assert!(rate > 0.7);
    }

    #[test]
    fn test_pool_weights_and_dedup() {
        let state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").neighbors(&["BB", "CC"]).port().airport().infected_with(10))
            .with_country(CountryBuilder::new("BB").neighbors(&["AA"]).port())
            .with_country(CountryBuilder::new("CC").neighbors(&["AA"]).infected_with(5))
            .with_country(CountryBuilder::new("DD").port().airport())
            .with_country(CountryBuilder::new("EE").airport())
            .build();
        let source = state.country("AA").unwrap();
        let pool = candidate_pool(&state, source, &CrossBorderConfig::default(), &mut StdRng::seed_from_u64(1));

        let by_id: BTreeMap<_, _> = pool.iter().map(|c| (c.id.as_str(), c)).collect();
        assert_eq!(by_id.len(), 3);
        assert_eq!(by_id["BB"].route, Route::Land);
        assert_eq!(by_id["BB"].weight, 10.0);
        assert_eq!(by_id["DD"].route, Route::Sea);
        assert_eq!(by_id["EE"].route, Route::Air);
        assert!(!by_id.contains_key("CC"));
    }

    #[test]
    fn test_sample_size_caps_remote_routes() {
        let mut builder = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").airport().infected_with(10));
        for i in 0..20 {
            builder = builder.with_country(CountryBuilder::new(&format!("X{i:02}")).airport());
        }
        let state = builder.build();
        let cfg = CrossBorderConfig::default();
        let pool = candidate_pool(&state, state.country("AA").unwrap(), &cfg, &mut StdRng::seed_from_u64(7));
        assert_eq!(pool.len(), cfg.air_sample_size);
        assert!(pool.iter().all(|c| c.route == Route::Air));
    }

    #[test]
    fn test_resolve_infects_poorer_neighbor() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("US").wealth_level(10).neighbors(&["MX"]).infected_with(100))
            .with_country(CountryBuilder::new("MX").wealth_level(5).neighbors(&["US"]))
            .build();
        let cfg = CrossBorderConfig::default();
        let outcome = resolve(&mut state, "US", &cfg, 10.0, &mut StepRng::new(0, 0)).unwrap();
        assert_eq!(
            outcome,
            CrossBorderOutcome::Infected {
                target: "MX".into(),
                route: Route::Land,
                believers: 10
            }
        );
        assert!(state.country("MX").unwrap().infected);
        assert_eq!(state.global.total_believers, 110);
    }

    #[test]
    fn test_resolve_failure_leaves_state() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("HT").wealth_level(2).neighbors(&["US"]).infected_with(100))
            .with_country(CountryBuilder::new("US").wealth_level(10))
            .build();
        let before = state.clone();
        let outcome = resolve(&mut state, "HT", &CrossBorderConfig::default(), 10.0, &mut StepRng::new(u64::MAX, 0)).unwrap();
        assert!(matches!(outcome, CrossBorderOutcome::Failed { ref target, .. } if target == "US"));
        assert_eq!(state, before);
    }

    #[test]
    fn test_poor_to_rich_bonus_multiplies_rate() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("HT").wealth_level(2).neighbors(&["US"]).infected_with(100))
            .with_country(CountryBuilder::new("US").wealth_level(10))
            .with_skill(SkillId::Compassion)
            .build();
        let outcome = resolve(&mut state, "HT", &CrossBorderConfig::default(), 10.0, &mut StepRng::new(u64::MAX, 0)).unwrap();
        let CrossBorderOutcome::Failed { success_rate, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!((success_rate - 3e-6).abs() < 1e-12);
    }

    #[test]
    fn test_no_candidates() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").infected_with(10))
            .build();
        let outcome = resolve(&mut state, "AA", &CrossBorderConfig::default(), 10.0, &mut StepRng::new(0, 0));
        assert_eq!(outcome, Some(CrossBorderOutcome::NoCandidates));
        assert_eq!(resolve(&mut state, "ZZ", &CrossBorderConfig::default(), 10.0, &mut StepRng::new(0, 0)), None);
    }
}
