use crate::config::SimConfig;
use crate::crossborder::{self, CrossBorderOutcome};
use crate::events::{CrossBorderRecord, EventContext, EventKind, EventOutcome, EventRecord, EventTable};
use crate::state::WorldState;
use rand::RngCore;
use tracing::instrument;

/// Evaluates the event table for every country infected at the start of the
/// turn and applies the outcomes.
///
/// Countries are processed one after another in id order. Each country's
/// rules see the country as it was before its own outcomes are applied.
/// Countries infected during this pass are first evaluated next turn.
#[instrument(skip_all, name = "spread")]
pub fn run_spread_tick(
    state: &mut WorldState,
    config: &SimConfig,
    table: &EventTable,
    rng: &mut dyn RngCore,
) -> Vec<EventRecord> {
    let turn = state.global.turn;
    let mut records = Vec::new();

    for id in state.infected_ids() {
        let fired = {
            let Some(country) = state.country(&id) else {
                continue;
            };
            let ctx = EventContext {
                country,
                skills: &state.skills,
                config,
                total_apostates: state.total_apostates(),
                wealth: state.global.wealth,
            };
            table.evaluate_country(&ctx, rng)
        };

        for (kind, outcome) in fired {
            if let Some(record) = apply_outcome(state, config, &id, kind, &outcome, rng) {
                records.push(EventRecord { turn, ..record });
            }
        }
    }

    records
}

fn apply_outcome(
    state: &mut WorldState,
    config: &SimConfig,
    id: &str,
    kind: EventKind,
    outcome: &EventOutcome,
    rng: &mut dyn RngCore,
) -> Option<EventRecord> {
    if outcome.cross_border {
        return resolve_cross_border(state, config, id, kind, rng);
    }

    let believers_delta = match outcome.believers_delta {
        d if d > 0 => state.add_believers(id, d as u64) as i64,
        d if d < 0 => -(state.remove_believers(id, d.unsigned_abs()) as i64),
        _ => 0,
    };

    let wealth_delta = outcome.wealth_delta.max(0.0);
    state.global.wealth += wealth_delta;

    let gdp_delta = if outcome.gdp_delta < 0.0 {
        apply_drain(state, config, id, outcome.gdp_delta)
    } else {
        0.0
    };

    Some(EventRecord {
        turn: 0,
        event: kind,
        country: id.to_string(),
        believers_delta,
        wealth_delta,
        gdp_delta,
        cross_border: None,
    })
}

/// Lowers GDP by `delta` (negative). Stops at the wealth floor unless drain
/// skills are allowed to break it. Returns the applied change.
fn apply_drain(state: &mut WorldState, config: &SimConfig, id: &str, delta: f64) -> f64 {
    let cfg = &config.wealth_transfer;
    let can_break = cfg.skill_can_break_limit && state.skills.breaks_wealth_floor();
    let Some(country) = state.countries.get_mut(id) else {
        return 0.0;
    };

    let floor = country.wealth_floor(cfg.min_wealth_ratio);
    let before = country.gdp;
    let mut after = (before + delta).max(0.0);
    if !can_break {
        // Never raise GDP here, only stop at the floor.
        after = after.max(floor.min(before));
    }
    if after < floor {
        country.floor_broken = true;
    }
    country.gdp = after;
    after - before
}

fn resolve_cross_border(
    state: &mut WorldState,
    config: &SimConfig,
    source: &str,
    kind: EventKind,
    rng: &mut dyn RngCore,
) -> Option<EventRecord> {
    let outcome = crossborder::resolve(
        state,
        source,
        &config.events.cross_border,
        config.skills.compassion_wealth_cutoff,
        rng,
    )?;
    let CrossBorderOutcome::Infected {
        target,
        route,
        believers,
    } = outcome
    else {
        return None;
    };
    Some(EventRecord {
        turn: 0,
        event: kind,
        country: target.clone(),
        believers_delta: believers as i64,
        wealth_delta: 0.0,
        gdp_delta: 0.0,
        cross_border: Some(CrossBorderRecord {
            source: source.to_string(),
            target,
            route,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crossborder::Route;
    use crate::skills::SkillId;
    use crate::testing::{CountryBuilder, WorldStateBuilder};
    use rand::rngs::mock::StepRng;

    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn test_growth_is_clamped_and_credited() {
        let mut state = WorldStateBuilder::new()
            .with_country(
                CountryBuilder::new("AA")
                    .population(1000)
                    .wealth_level(1)
                    .infected_with(990)
                    .apostates(5),
            )
            .build();
        let config = SimConfig::production();
        let records = run_spread_tick(&mut state, &config, &EventTable::standard(), &mut always());

        let country = state.country("AA").unwrap();
        assert_eq!(country.believers + country.apostates, 1000);
        assert_eq!(state.global.total_believers, country.believers);
        let gained: i64 = records.iter().map(|r| r.believers_delta).sum();
        assert_eq!(gained, 5);
    }

    #[test]
    fn test_uninfected_countries_are_skipped() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").believers(0))
            .build();
        let records = run_spread_tick(
            &mut state,
            &SimConfig::production(),
            &EventTable::standard(),
            &mut always(),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_cross_border_record_names_both_sides() {
        let mut state = WorldStateBuilder::new()
            .with_country(
                CountryBuilder::new("US")
                    .population(1000)
                    .wealth_level(10)
                    .neighbors(&["MX"])
                    .infected_with(1000),
            )
            .with_country(CountryBuilder::new("MX").wealth_level(5).neighbors(&["US"]))
            .turn(3)
            .build();
        let records = run_spread_tick(
            &mut state,
            &SimConfig::production(),
            &EventTable::standard(),
            &mut always(),
        );
        let cross = records
            .iter()
            .find(|r| r.event == EventKind::CrossBorderSpread)
            .unwrap();
        assert_eq!(cross.turn, 3);
        assert_eq!(cross.country, "MX");
        assert_eq!(
            cross.cross_border,
            Some(CrossBorderRecord {
                source: "US".into(),
                target: "MX".into(),
                route: Route::Land
            })
        );
        // The new country is not evaluated in the same pass.
        assert_eq!(state.country("MX").unwrap().believers, 10);
    }

    #[test]
    fn test_drain_stops_at_floor_without_break_skills() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").original_gdp(1.0).gdp(0.051))
            .build();
        let mut config = SimConfig::production();
        config.wealth_transfer.skill_can_break_limit = false;
        let applied = apply_drain(&mut state, &config, "AA", -0.5);
        assert!((applied + 0.001).abs() < 1e-12);
        let country = state.country("AA").unwrap();
        assert!((country.gdp - 0.05).abs() < 1e-12);
        assert!(!country.floor_broken);
    }

    #[test]
    fn test_drain_skill_breaks_floor() {
        let mut state = WorldStateBuilder::new()
            .with_country(CountryBuilder::new("AA").original_gdp(1.0).gdp(0.06))
            .with_skill(SkillId::SCorrupt)
            .build();
        apply_drain(&mut state, &SimConfig::production(), "AA", -0.05);
        let country = state.country("AA").unwrap();
        assert!(country.gdp < 0.05);
        assert!(country.floor_broken);
    }
}
