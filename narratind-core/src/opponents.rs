//! Philosopher (opponent) manager.
//!
//! # State machine
//!
//! ```text
//!            spawn                      deadline passed
//! Dormant ───────────▶ Active ─────────────────────────▶ timeout
//!    ▲                 │  │ click ok, health <= 0            │
//!    │                 │  └──────────────▶ Destroyed         │ max_health >= threshold
//!    │                 │ click ok, roll                      │ and host has no believers
//!    │                 └──────▶ migrate (Active elsewhere)   ▼
//!    │                                                 invade (Active, invading)
//!    │  failed click while invading: escape                  │
//!    └───────────────────────────────────────────────────────┘
//! ```
//!
//! At most one active philosopher per country and one display per entity.
//! The population cap scales with the global believer ratio.

use crate::config::{DifficultyProfile, SimConfig};
use crate::events::roll;
use crate::observer::event_log::GameEvent;
use crate::registry::connected;
use crate::skills::{EffectType, ModifierContext};
use crate::state::{CountryId, Philosopher, PhilosopherId, PhilosopherPhase, WorldState};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use thiserror::Error;
use tracing::instrument;

pub const PHILOSOPHER_NAMES: [&str; 10] = [
    "Socrates",
    "Plato",
    "Aristotle",
    "Descartes",
    "Kant",
    "Hegel",
    "Nietzsche",
    "Sartre",
    "Russell",
    "Wittgenstein",
];

#[derive(Error, Debug, PartialEq)]
pub enum OpponentError {
    #[error("Unknown philosopher: {0}")]
    Unknown(PhilosopherId),
    #[error("Philosopher {0} is not currently active")]
    NotActive(PhilosopherId),
}

/// `floor(1 + (ratio - 0.1) / 0.9 × 9)` clamped to [1, 10].
pub fn population_cap(global_believer_ratio: f64) -> usize {
    let raw = (1.0 + (global_believer_ratio - 0.1) / 0.9 * 9.0).floor();
    raw.clamp(1.0, PHILOSOPHER_NAMES.len() as f64) as usize
}

fn is_eligible_host(state: &WorldState, id: &str, profile: &DifficultyProfile) -> bool {
    state.country(id).is_some_and(|c| {
        c.infected
            && c.believers >= profile.min_country_believers
            && c.believer_ratio() >= profile.country_believer_ratio
    }) && !state.has_active_philosopher(id)
}

fn modifier_ctx(state: &WorldState, config: &SimConfig) -> ModifierContext<'static> {
    ModifierContext::new(state.global.wealth, config.skills.compassion_wealth_cutoff)
}

fn activate(philosopher: &mut Philosopher, turn: u64, display_turns: u32) {
    philosopher.phase = PhilosopherPhase::Active {
        since_turn: turn,
        deadline_turn: turn + display_turns as u64,
    };
}

/// One opponent check cycle: cooldowns, timeouts, then spawns.
#[instrument(skip_all, name = "opponents")]
pub fn run_opponent_check(
    state: &mut WorldState,
    config: &SimConfig,
    rng: &mut dyn RngCore,
) -> Vec<GameEvent> {
    let turn = state.global.turn;
    let mut events = Vec::new();

    state.disabled_identities.retain(|_, until| *until > turn);

    let expired: Vec<PhilosopherId> = state
        .philosophers
        .values()
        .filter(|p| p.deadline().is_some_and(|deadline| deadline <= turn))
        .map(|p| p.id)
        .collect();
    for id in expired {
        events.extend(resolve_timeout(state, config, id, rng));
    }

    let profile = config.difficulty.profile();
    let opponent_mod = state
        .skills
        .modifier(EffectType::OpponentProbability, &modifier_ctx(state, config));
    let chance =
        config.opponents.spawn_probability * opponent_mod * profile.probability_multiplier;

    let candidates: Vec<CountryId> = state
        .countries
        .keys()
        .filter(|id| is_eligible_host(state, id, &profile))
        .cloned()
        .collect();
    for country in candidates {
        if !roll(rng, chance) {
            continue;
        }
        match spawn(state, config, &country, rng) {
            Some(event) => events.push(event),
            // Cap reached or no identity left; later countries would fail too.
            None => break,
        }
    }

    events
}

/// Displays a philosopher in `country`.
///
/// Reuses a dormant entity (one already in `country` first), otherwise
/// creates one from a free identity while under the population cap.
pub fn spawn(
    state: &mut WorldState,
    config: &SimConfig,
    country: &str,
    rng: &mut dyn RngCore,
) -> Option<GameEvent> {
    if state.country(country).is_none() || state.has_active_philosopher(country) {
        return None;
    }
    let turn = state.global.turn;
    let cap = population_cap(state.global_believer_ratio());
    let active = state.philosophers.values().filter(|p| p.is_active()).count();
    if active >= cap {
        return None;
    }

    let dormant = state
        .philosophers
        .values()
        .filter(|p| !p.is_active())
        .min_by_key(|p| (p.country != country, p.id))
        .map(|p| p.id);

    let id = match dormant {
        Some(id) => id,
        None => {
            if state.philosophers.len() >= cap {
                return None;
            }
            let free: Vec<&str> = PHILOSOPHER_NAMES
                .iter()
                .copied()
                .filter(|name| {
                    !state.disabled_identities.contains_key(*name)
                        && !state.philosophers.values().any(|p| p.name == *name)
                })
                .collect();
            let name = free.choose(rng)?.to_string();
            let health = (config.opponents.initial_health as f64
                * config.difficulty.profile().health_multiplier)
                .round() as i64;
            let id = state.next_philosopher_id;
            state.next_philosopher_id += 1;
            state.philosophers.insert(
                id,
                Philosopher {
                    id,
                    name,
                    country: country.to_string(),
                    home_country: country.to_string(),
                    health,
                    max_health: health,
                    reputation: 0,
                    resist_count: 0,
                    is_invading: false,
                    phase: PhilosopherPhase::Dormant,
                },
            );
            id
        }
    };

    let philosopher = state.philosophers.get_mut(&id)?;
    philosopher.country = country.to_string();
    philosopher.home_country = country.to_string();
    philosopher.is_invading = false;
    activate(philosopher, turn, config.opponents.display_turns);
    log::info!("{} appeared in {}", philosopher.name, country);

    Some(GameEvent::OpponentAppeared {
        turn,
        philosopher: id,
        name: philosopher.name.clone(),
        country: country.to_string(),
        health: philosopher.health,
    })
}

/// Success chance of a click against `id` in its current country.
pub fn click_success_chance(state: &WorldState, config: &SimConfig, id: PhilosopherId) -> f64 {
    let Some(philosopher) = state.philosophers.get(&id) else {
        return 0.0;
    };
    let Some(host) = state.country(&philosopher.country) else {
        return 0.0;
    };
    let modifier = state
        .skills
        .modifier(EffectType::CounterAttackSuccess, &modifier_ctx(state, config));
    let mut chance = host.believer_ratio() * host.gdp_ratio() * modifier;
    if philosopher.is_invading {
        chance = (chance * config.opponents.invading_click_bonus).min(config.opponents.invading_click_cap);
    }
    chance.clamp(0.0, 1.0)
}

/// Player click on an active philosopher.
pub fn attack(
    state: &mut WorldState,
    config: &SimConfig,
    id: PhilosopherId,
    rng: &mut dyn RngCore,
) -> Result<GameEvent, OpponentError> {
    let philosopher = state.philosophers.get(&id).ok_or(OpponentError::Unknown(id))?;
    if !philosopher.is_active() {
        return Err(OpponentError::NotActive(id));
    }

    let chance = click_success_chance(state, config, id);
    let event = if roll(rng, chance) {
        click_success(state, config, id, rng)
    } else {
        click_failure(state, id)
    };
    event.ok_or(OpponentError::Unknown(id))
}

fn click_failure(state: &mut WorldState, id: PhilosopherId) -> Option<GameEvent> {
    let turn = state.global.turn;
    let escape_to = state
        .philosophers
        .get(&id)
        .filter(|p| p.is_invading)
        .and_then(|p| escape_target(state, p));

    let philosopher = state.philosophers.get_mut(&id)?;
    philosopher.health += 1;
    philosopher.max_health += 1;
    philosopher.resist_count += 1;
    let country = philosopher.country.clone();

    let mut escaped_to = None;
    if philosopher.is_invading {
        if let Some(target) = escape_to {
            philosopher.country = target.clone();
            escaped_to = Some(target);
        }
        philosopher.is_invading = false;
        philosopher.phase = PhilosopherPhase::Dormant;
        log::info!("{} escaped from {}", philosopher.name, country);
    }

    Some(GameEvent::OpponentResisted {
        turn,
        philosopher: id,
        name: philosopher.name.clone(),
        country,
        health: philosopher.health,
        max_health: philosopher.max_health,
        escaped_to,
    })
}

/// Home country if free, otherwise the free neighbour with the lowest
/// believer ratio.
fn escape_target(state: &WorldState, philosopher: &Philosopher) -> Option<CountryId> {
    let free = |id: &str| id != philosopher.country && !state.has_active_philosopher(id);
    if state.country(&philosopher.home_country).is_some() && free(&philosopher.home_country) {
        return Some(philosopher.home_country.clone());
    }
    let current = state.country(&philosopher.country)?;
    current
        .neighbors
        .iter()
        .filter_map(|n| state.country(n))
        .filter(|c| free(&c.id))
        .min_by(|a, b| a.believer_ratio().total_cmp(&b.believer_ratio()))
        .map(|c| c.id.clone())
}

fn click_success(
    state: &mut WorldState,
    config: &SimConfig,
    id: PhilosopherId,
    rng: &mut dyn RngCore,
) -> Option<GameEvent> {
    let turn = state.global.turn;
    let damage_mod = state
        .skills
        .modifier(EffectType::CounterAttackDamage, &modifier_ctx(state, config));
    let damage = (config.opponents.base_damage * damage_mod).round() as i64;

    let philosopher = state.philosophers.get_mut(&id)?;
    philosopher.health -= damage;
    let country = philosopher.country.clone();

    if philosopher.health <= 0 {
        let name = philosopher.name.clone();
        state.philosophers.remove(&id);
        let disabled_until = turn + config.opponents.disable_turns as u64;
        state.disabled_identities.insert(name.clone(), disabled_until);
        log::info!("{} was defeated in {}", name, country);
        return Some(GameEvent::OpponentDestroyed {
            turn,
            philosopher: id,
            name,
            country,
            disabled_until,
        });
    }

    let mut migrated_to = None;
    if roll(rng, config.opponents.migration_probability) {
        let targets: Vec<CountryId> = state
            .country(&country)
            .map(|c| {
                c.neighbors
                    .iter()
                    .filter(|n| {
                        state.country(n).is_some_and(|t| t.infected)
                            && !state.has_active_philosopher(n)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        migrated_to = targets.choose(rng).cloned();
    }

    let philosopher = state.philosophers.get_mut(&id)?;
    if let Some(target) = &migrated_to {
        philosopher.country = target.clone();
        activate(philosopher, turn, config.opponents.display_turns);
        log::debug!("{} migrated from {} to {}", philosopher.name, country, target);
    }

    Some(GameEvent::OpponentDamaged {
        turn,
        philosopher: id,
        name: philosopher.name.clone(),
        country,
        damage,
        health: philosopher.health,
        migrated_to,
    })
}

/// Applies the penalty for a philosopher that outlived its display.
///
/// The host loses believers to apostasy, the philosopher regrows, and if it
/// has become strong enough while the host is empty it invades a connected
/// infected country.
pub fn resolve_timeout(
    state: &mut WorldState,
    config: &SimConfig,
    id: PhilosopherId,
    rng: &mut dyn RngCore,
) -> Vec<GameEvent> {
    let turn = state.global.turn;
    let cfg = &config.opponents;
    let profile = config.difficulty.profile();

    let Some(philosopher) = state.philosophers.get(&id) else {
        return Vec::new();
    };
    let host_id = philosopher.country.clone();
    let power = if philosopher.max_health > 0 {
        (philosopher.health.max(0) as f64 / philosopher.max_health as f64).min(1.0)
    } else {
        0.0
    };
    let requested = state
        .country(&host_id)
        .map(|host| {
            let base = host.believers as f64 * cfg.loss_rate
                + host.population as f64 * cfg.loss_rate
                + philosopher.reputation as f64 * cfg.loss_rate;
            (base * power * profile.damage_multiplier).ceil() as u64
        })
        .unwrap_or(0);
    let lost = state.convert_to_apostates(&host_id, requested);

    let growth = rng.gen_range(cfg.growth_min..=cfg.growth_max);
    let recover = rng.gen_range(cfg.recover_min..=cfg.recover_max);
    let host_empty = state.country(&host_id).is_some_and(|c| c.believers == 0);

    let Some(philosopher) = state.philosophers.get_mut(&id) else {
        return Vec::new();
    };
    philosopher.reputation += lost;
    philosopher.max_health += growth;
    philosopher.health = (philosopher.health + recover).min(philosopher.max_health);
    philosopher.phase = PhilosopherPhase::Dormant;
    philosopher.is_invading = false;
    let name = philosopher.name.clone();
    let (health, max_health) = (philosopher.health, philosopher.max_health);
    log::info!("{} converted {} believers in {} to apostasy", name, lost, host_id);

    let mut events = vec![GameEvent::OpponentTimedOut {
        turn,
        philosopher: id,
        name: name.clone(),
        country: host_id.clone(),
        believers_lost: lost,
        health,
        max_health,
    }];

    if max_health >= cfg.invasion_threshold && host_empty {
        let targets: Vec<CountryId> = connected(&state.countries, &host_id)
            .into_iter()
            .filter(|t| {
                state.country(t).is_some_and(|c| c.infected && c.believers > 0)
                    && !state.has_active_philosopher(t)
            })
            .collect();
        if let Some(target) = targets.choose(rng).cloned() {
            if let Some(philosopher) = state.philosophers.get_mut(&id) {
                philosopher.home_country = host_id.clone();
                philosopher.country = target.clone();
                philosopher.is_invading = true;
                activate(philosopher, turn, cfg.display_turns);
            }
            log::warn!("{} invaded {} from {}", name, target, host_id);
            events.push(GameEvent::OpponentInvaded {
                turn,
                philosopher: id,
                name,
                from: host_id,
                to: target,
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountryBuilder, WorldStateBuilder};
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn host(id: &str) -> CountryBuilder {
        CountryBuilder::new(id).population(1000).infected_with(500)
    }

    #[test]
    fn test_population_cap_scales_with_ratio() {
        assert_eq!(population_cap(0.0), 1);
        assert_eq!(population_cap(0.1), 1);
        assert_eq!(population_cap(0.2), 2);
        assert_eq!(population_cap(0.55), 5);
        assert_eq!(population_cap(1.0), 10);
        assert_eq!(population_cap(1.5), 10);
    }

    #[test]
    fn test_failed_clicks_then_success() {
        let mut state = WorldStateBuilder::new()
            .with_country(host("AA"))
            .with_philosopher("Kant", "AA", 100)
            .build();
        let config = SimConfig::production();

        for _ in 0..2 {
            let event = attack(&mut state, &config, 0, &mut never()).unwrap();
            assert!(matches!(event, GameEvent::OpponentResisted { escaped_to: None, .. }));
        }
        let p = &state.philosophers[&0];
        assert_eq!((p.health, p.max_health, p.resist_count), (102, 102, 2));

        let event = attack(&mut state, &config, 0, &mut always()).unwrap();
        assert!(matches!(event, GameEvent::OpponentDamaged { damage: 30, health: 72, migrated_to: None, .. }));
        let p = &state.philosophers[&0];
        assert_eq!(p.health, 72);
        assert!(p.is_active());
    }

    #[test]
    fn test_destroyed_identity_is_disabled() {
        let mut state = WorldStateBuilder::new()
            .with_country(host("AA"))
            .with_philosopher("Kant", "AA", 20)
            .turn(4)
            .build();
        let config = SimConfig::production();
        let event = attack(&mut state, &config, 0, &mut always()).unwrap();
        assert!(matches!(event, GameEvent::OpponentDestroyed { disabled_until: 24, .. }));
        assert!(state.philosophers.is_empty());
        assert_eq!(state.disabled_identities.get("Kant"), Some(&24));
    }

    #[test]
    fn test_attack_errors() {
        let mut state = WorldStateBuilder::new().with_country(host("AA")).build();
        let config = SimConfig::production();
        assert_eq!(
            attack(&mut state, &config, 9, &mut always()),
            Err(OpponentError::Unknown(9))
        );
        state = WorldStateBuilder::new()
            .with_country(host("AA"))
            .with_philosopher("Kant", "AA", 100)
            .build();
        state.philosophers.get_mut(&0).unwrap().phase = PhilosopherPhase::Dormant;
        assert_eq!(
            attack(&mut state, &config, 0, &mut always()),
            Err(OpponentError::NotActive(0))
        );
    }

    #[test]
    fn test_success_may_migrate_to_free_infected_neighbor() {
        let mut state = WorldStateBuilder::new()
            .with_country(host("AA").neighbors(&["BB", "CC"]))
            .with_country(host("BB"))
            .with_country(CountryBuilder::new("CC"))
            .with_philosopher("Kant", "AA", 100)
            .turn(2)
            .build();
        let event = attack(&mut state, &SimConfig::production(), 0, &mut always()).unwrap();
        assert!(matches!(event, GameEvent::OpponentDamaged { ref migrated_to, .. } if migrated_to.as_deref() == Some("BB")));
        let p = &state.philosophers[&0];
        assert_eq!(p.country, "BB");
        assert_eq!(p.deadline(), Some(7));
    }

    #[test]
    fn test_invading_click_bonus_is_capped() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").population(1000).infected_with(900))
            .with_philosopher("Kant", "AA", 100)
            .build();
        let config = SimConfig::production();
        assert!((click_success_chance(&state, &config, 0) - 0.9).abs() < 1e-12);
        state.philosophers.get_mut(&0).unwrap().is_invading = true;
        assert_eq!(click_success_chance(&state, &config, 0), 0.95);
    }

    #[test]
    fn test_failed_click_while_invading_escapes_home() {
        let mut state = WorldStateBuilder::new()
            .with_country(host("AA"))
            .with_country(host("BB"))
            .with_philosopher("Kant", "BB", 100)
            .build();
        {
            let p = state.philosophers.get_mut(&0).unwrap();
            p.is_invading = true;
            p.home_country = "AA".into();
        }
        let event = attack(&mut state, &SimConfig::production(), 0, &mut never()).unwrap();
        assert!(matches!(event, GameEvent::OpponentResisted { ref escaped_to, .. } if escaped_to.as_deref() == Some("AA")));
        let p = &state.philosophers[&0];
        assert_eq!(p.country, "AA");
        assert!(!p.is_invading);
        assert!(!p.is_active());
        assert_eq!(p.max_health, 101);
    }

    #[test]
    fn test_escape_falls_back_to_least_converted_neighbor() {
        let mut state = WorldStateBuilder::new()
            .with_country(host("AA").neighbors(&["BB", "CC", "HOME"]))
            .with_country(host("BB"))
            .with_country(CountryBuilder::new("CC").population(1000).infected_with(100))
            .with_country(host("HOME"))
            .with_philosopher("Kant", "AA", 100)
            .with_philosopher("Hegel", "HOME", 100)
            .build();
        {
            let p = state.philosophers.get_mut(&0).unwrap();
            p.is_invading = true;
            p.home_country = "HOME".into();
        }
        let event = attack(&mut state, &SimConfig::production(), 0, &mut never()).unwrap();
        assert!(matches!(event, GameEvent::OpponentResisted { ref escaped_to, .. } if escaped_to.as_deref() == Some("CC")));
        let p = &state.philosophers[&0];
        assert_eq!(p.country, "CC");
        assert!(!p.is_invading);
        assert_eq!(p.phase, PhilosopherPhase::Dormant);
    }

    #[test]
    fn test_success_without_free_infected_neighbor_stays() {
        let mut state = WorldStateBuilder::new()
            .with_country(host("AA").neighbors(&["BB", "CC"]))
            .with_country(CountryBuilder::new("BB"))
            .with_country(host("CC"))
            .with_philosopher("Kant", "AA", 100)
            .with_philosopher("Hegel", "CC", 100)
            .build();
        let event = attack(&mut state, &SimConfig::production(), 0, &mut always()).unwrap();
        assert!(matches!(event, GameEvent::OpponentDamaged { health: 70, migrated_to: None, .. }));
        let p = &state.philosophers[&0];
        assert_eq!(p.country, "AA");
        assert!(p.is_active());
    }

    #[test]
    fn test_strong_philosopher_without_target_stays_home() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").population(1000).infected_with(5).neighbors(&["BB", "CC"]))
            .with_country(CountryBuilder::new("BB"))
            .with_country(host("CC"))
            .with_philosopher("Kant", "AA", 200)
            .with_philosopher("Hegel", "CC", 100)
            .build();
        let events = resolve_timeout(&mut state, &SimConfig::production(), 0, &mut always());

        assert_eq!(state.country("AA").unwrap().believers, 0);
        assert!(matches!(events[..], [GameEvent::OpponentTimedOut { .. }]));
        let p = &state.philosophers[&0];
        assert!(p.max_health >= 150);
        assert_eq!(p.country, "AA");
        assert!(!p.is_invading);
        assert_eq!(p.phase, PhilosopherPhase::Dormant);
    }

    #[test]
    fn test_timeout_converts_believers_and_grows() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").population(10_000).infected_with(5000))
            .with_philosopher("Kant", "AA", 100)
            .build();
        state.philosophers.get_mut(&0).unwrap().health = 50;
        let events = resolve_timeout(&mut state, &SimConfig::production(), 0, &mut always());

        // (5000 + 10000 + 0) × 0.01 × 0.5
        let country = state.country("AA").unwrap();
        assert_eq!(country.believers, 4925);
        assert_eq!(country.apostates, 75);
        assert_eq!(state.global.total_believers, 4925);

        let p = &state.philosophers[&0];
        assert_eq!(p.reputation, 75);
        assert_eq!(p.max_health, 101);
        assert_eq!(p.health, 55);
        assert!(!p.is_active());
        assert!(matches!(events[..], [GameEvent::OpponentTimedOut { believers_lost: 75, .. }]));
    }

    #[test]
    fn test_strong_philosopher_invades_from_empty_host() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").population(1000).infected_with(5).neighbors(&["BB"]))
            .with_country(host("BB"))
            .with_philosopher("Kant", "AA", 200)
            .build();
        let events = resolve_timeout(&mut state, &SimConfig::production(), 0, &mut always());

        assert_eq!(state.country("AA").unwrap().believers, 0);
        assert!(matches!(events.last(), Some(GameEvent::OpponentInvaded { to, .. }) if to == "BB"));
        let p = &state.philosophers[&0];
        assert!(p.is_invading);
        assert!(p.is_active());
        assert_eq!(p.home_country, "AA");
    }

    #[test]
    fn test_spawn_prefers_dormant_in_same_country() {
        let mut state = WorldStateBuilder::new()
            .with_country(host("AA"))
            .with_country(host("BB"))
            .with_philosopher("Kant", "AA", 100)
            .with_philosopher("Hegel", "BB", 100)
            .build();
        for p in state.philosophers.values_mut() {
            p.phase = PhilosopherPhase::Dormant;
        }
        let config = SimConfig::production();
        let event = spawn(&mut state, &config, "BB", &mut always()).unwrap();
        assert!(matches!(event, GameEvent::OpponentAppeared { philosopher: 1, .. }));
        let event = spawn(&mut state, &config, "AA", &mut always()).unwrap();
        assert!(matches!(event, GameEvent::OpponentAppeared { philosopher: 0, .. }));
        // One display per country.
        assert!(spawn(&mut state, &config, "BB", &mut always()).is_none());
        assert_eq!(state.philosophers.len(), 2);
    }

    #[test]
    fn test_spawn_respects_population_cap() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").population(1000).infected_with(50))
            .with_country(CountryBuilder::new("BB").population(1000).infected_with(50))
            .build();
        let config = SimConfig::production();
        assert!(spawn(&mut state, &config, "AA", &mut always()).is_some());
        assert!(spawn(&mut state, &config, "BB", &mut always()).is_none());
    }

    #[test]
    fn test_spawn_creates_fresh_identity_with_difficulty_health() {
        let mut state = WorldStateBuilder::new().with_country(host("AA")).build();
        state.disabled_identities.insert("Socrates".into(), 100);
        let config = SimConfig::production().with_difficulty(crate::config::Difficulty::Hard);
        spawn(&mut state, &config, "AA", &mut always()).unwrap();
        let p = &state.philosophers[&0];
        assert_eq!(p.name, "Plato");
        assert_eq!(p.health, 130);
        assert_eq!(p.deadline(), Some(5));
    }

    #[test]
    fn test_check_expires_cooldowns_and_spawns() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").population(100_000).infected_with(60_000))
            .with_country(CountryBuilder::new("BB").population(100_000).infected_with(10))
            .turn(30)
            .build();
        state.disabled_identities.insert("Kant".into(), 30);
        let events = run_opponent_check(&mut state, &SimConfig::production(), &mut always());
        assert!(state.disabled_identities.is_empty());
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], GameEvent::OpponentAppeared { country, .. } if country == "AA"));
    }

    proptest! {
        #[test]
        fn prop_timeouts_keep_invariants(seed in any::<u64>(), believers in 0u64..10_000, apostates in 0u64..5_000) {
            let mut state = WorldStateBuilder::new()
                .with_country(CountryBuilder::new("AA").population(20_000).infected_with(believers).apostates(apostates).neighbors(&["BB"]))
                .with_country(host("BB"))
                .with_philosopher("Kant", "AA", 100)
                .build();
            let mut rng = StdRng::seed_from_u64(seed);
            let config = SimConfig::production();
            let mut reputation = 0;
            for _ in 0..5 {
                let Some(id) = state.philosophers.keys().next().copied() else { break };
                resolve_timeout(&mut state, &config, id, &mut rng);
                for c in state.countries.values() {
                    prop_assert!(c.believers + c.apostates <= c.population);
                }
                let p = &state.philosophers[&id];
                prop_assert!(p.reputation >= reputation);
                prop_assert!(p.health <= p.max_health);
                reputation = p.reputation;
            }
            let active_hosts: Vec<_> = state.philosophers.values().filter(|p| p.is_active()).map(|p| p.country.clone()).collect();
            let mut dedup = active_hosts.clone();
            dedup.dedup();
            prop_assert_eq!(active_hosts, dedup);
        }
    }
}
