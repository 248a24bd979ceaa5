//! "Good person" special events.
//!
//! A good person appears in an infected country and stays for a few turns.
//! Claiming it before it expires grants a burst of believers; the crowned
//! variant also wins apostates back.

use crate::config::SimConfig;
use crate::events::roll;
use crate::observer::event_log::GameEvent;
use crate::skills::ModifierContext;
use crate::state::{CountryId, SpecialEvent, SpecialEventId, WorldState};
use rand::RngCore;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug, PartialEq)]
pub enum SpecialEventError {
    #[error("Unknown special event: {0}")]
    Unknown(SpecialEventId),
}

/// Expires stale displays, then rolls new ones.
#[instrument(skip_all, name = "special_events")]
pub fn run_special_event_check(
    state: &mut WorldState,
    config: &SimConfig,
    rng: &mut dyn RngCore,
) -> Vec<GameEvent> {
    let turn = state.global.turn;
    let cfg = &config.special_events;
    let mut events = Vec::new();

    let expired: Vec<SpecialEventId> = state
        .special_events
        .values()
        .filter(|e| e.expires_turn <= turn)
        .map(|e| e.id)
        .collect();
    for id in expired {
        if let Some(event) = state.special_events.remove(&id) {
            log::debug!("Good person in {} left unclaimed", event.country);
            events.push(GameEvent::SpecialEventExpired {
                turn,
                event: id,
                country: event.country,
            });
        }
    }

    let ctx = ModifierContext::new(state.global.wealth, config.skills.compassion_wealth_cutoff);
    let effect = state.skills.good_person_effect(&ctx);
    let mut displayed: FxHashSet<CountryId> = state
        .special_events
        .values()
        .map(|e| e.country.clone())
        .collect();

    let candidates: Vec<CountryId> = state
        .countries
        .values()
        .filter(|c| {
            let ratio = c.believer_ratio();
            c.infected && ratio >= cfg.min_ratio && ratio < cfg.max_ratio
        })
        .map(|c| c.id.clone())
        .collect();

    for country_id in candidates {
        if state.special_events.len() >= cfg.max_active {
            break;
        }
        if displayed.contains(&country_id) {
            continue;
        }
        let Some(country) = state.country(&country_id) else {
            continue;
        };
        if state.skills.should_skip_good_person(country, effect.crowned) {
            continue;
        }
        if !roll(rng, cfg.good_person_probability) {
            continue;
        }

        let id = state.next_special_event_id;
        state.next_special_event_id += 1;
        let expires_turn = turn + cfg.duration_turns as u64;
        state.special_events.insert(
            id,
            SpecialEvent {
                id,
                country: country_id.clone(),
                spawned_turn: turn,
                expires_turn,
            },
        );
        displayed.insert(country_id.clone());
        log::info!("A good person appeared in {}", country_id);
        events.push(GameEvent::SpecialEventAppeared {
            turn,
            event: id,
            country: country_id,
            expires_turn,
            crowned: effect.crowned,
        });
    }

    events
}

/// Claims a displayed good person.
///
/// Gain is `effect_multiplier × ceil(believers × self-spread growth rate)`,
/// scaled by the good-person modifier and clamped to the convertible pool.
pub fn claim(
    state: &mut WorldState,
    config: &SimConfig,
    id: SpecialEventId,
) -> Result<GameEvent, SpecialEventError> {
    let event = state
        .special_events
        .remove(&id)
        .ok_or(SpecialEventError::Unknown(id))?;
    let turn = state.global.turn;

    let ctx = ModifierContext::new(state.global.wealth, config.skills.compassion_wealth_cutoff);
    let effect = state.skills.good_person_effect(&ctx);
    let believers = state.country(&event.country).map_or(0, |c| c.believers);
    let step = (believers as f64 * config.events.self_spread.base_growth_rate).ceil();
    let amount = (step * config.special_events.effect_multiplier * effect.modifier).ceil() as u64;

    let believers_gained = state.add_believers(&event.country, amount);
    let apostates_restored = if effect.crowned {
        state.restore_apostates(&event.country, amount)
    } else {
        0
    };
    log::info!(
        "Good person in {} claimed: +{} believers, {} apostates restored",
        event.country,
        believers_gained,
        apostates_restored
    );

    Ok(GameEvent::SpecialEventClaimed {
        turn,
        event: id,
        country: event.country,
        believers_gained,
        apostates_restored,
    })
}
