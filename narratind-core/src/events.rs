//! Per-country event rules.
//!
//! Each [`EventKind`] has one [`EventRule`] implementation. Rules only read
//! an [`EventContext`] and return an [`EventOutcome`]; the spread system
//! applies outcomes afterwards with clamping, so a rule never mutates state.
//!
//! Probability pipeline shared by the spreading rules:
//!
//! ```text
//! base chance
//!   × believer bonus / wealth factor   (rule specific)
//!   × 0.5^(country_apostates / total_apostates)
//!   × skill spread modifier
//!   × rule-specific skill bonuses
//!   → clamp [0, 1] → draw
//! ```
//!
//! Magnitudes start from the believer-ratio tier multiplier and round up so a
//! triggered event on a non-empty base always moves at least one person.

use crate::config::SimConfig;
use crate::crossborder::Route;
use crate::skills::{EffectType, ModifierContext, SkillId, SkillSet};
use crate::state::{Country, CountryId};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SelfSpread,
    AttractDissatisfied,
    RealHelp,
    CrossBorderSpread,
    WealthDrain,
    BelieverLoss,
}

impl EventKind {
    /// Evaluation order within a country.
    pub const ALL: [EventKind; 6] = [
        EventKind::SelfSpread,
        EventKind::AttractDissatisfied,
        EventKind::RealHelp,
        EventKind::CrossBorderSpread,
        EventKind::WealthDrain,
        EventKind::BelieverLoss,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SelfSpread => "self_spread",
            EventKind::AttractDissatisfied => "attract_dissatisfied",
            EventKind::RealHelp => "real_help",
            EventKind::CrossBorderSpread => "cross_border_spread",
            EventKind::WealthDrain => "wealth_drain",
            EventKind::BelieverLoss => "believer_loss",
        }
    }

    /// Internal growth events, skipped once nobody is left to convert.
    pub fn is_internal_growth(self) -> bool {
        matches!(
            self,
            EventKind::SelfSpread | EventKind::AttractDissatisfied | EventKind::RealHelp
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only inputs for one country's evaluation.
#[derive(Clone, Copy)]
pub struct EventContext<'a> {
    pub country: &'a Country,
    pub skills: &'a SkillSet,
    pub config: &'a SimConfig,
    /// Apostates across all countries.
    pub total_apostates: u64,
    /// Current global wealth.
    pub wealth: f64,
}

impl<'a> EventContext<'a> {
    /// `0.5^(country_apostates / total_apostates)`, or 1 when either is zero.
    pub fn apostate_penalty(&self) -> f64 {
        if self.country.apostates == 0 || self.total_apostates == 0 {
            return 1.0;
        }
        0.5_f64.powf(self.country.apostates as f64 / self.total_apostates as f64)
    }

    pub fn spread_modifier(&self) -> f64 {
        let ctx = ModifierContext::new(self.wealth, self.config.skills.compassion_wealth_cutoff);
        self.skills.modifier(EffectType::SpreadProbability, &ctx)
    }

    fn tier_multiplier(&self) -> f64 {
        self.config.tier_multiplier(self.country.believer_ratio())
    }

    fn has(&self, skill: SkillId) -> bool {
        self.skills.has(skill)
    }
}

/// What a rule decided for one country this turn.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EventOutcome {
    pub triggered: bool,
    /// Requested believer change before clamping.
    pub believers_delta: i64,
    /// Global wealth gained.
    pub wealth_delta: f64,
    /// Country GDP change (drains are negative).
    pub gdp_delta: f64,
    /// Hand off to the cross-border resolver.
    pub cross_border: bool,
}

impl EventOutcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn believers(delta: i64) -> Self {
        Self {
            triggered: true,
            believers_delta: delta,
            ..Default::default()
        }
    }
}

/// Source and destination of a successful cross-border spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossBorderRecord {
    pub source: CountryId,
    pub target: CountryId,
    pub route: Route,
}

/// An applied country event, as reported to the news feed.
///
/// Deltas are the amounts actually applied after clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub turn: u64,
    pub event: EventKind,
    pub country: CountryId,
    pub believers_delta: i64,
    pub wealth_delta: f64,
    pub gdp_delta: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_border: Option<CrossBorderRecord>,
}

/// Draws against `chance` after clamping it into [0, 1].
pub fn roll(rng: &mut dyn RngCore, chance: f64) -> bool {
    let chance = if chance.is_nan() { 0.0 } else { chance.clamp(0.0, 1.0) };
    rng.gen::<f64>() < chance
}

/// `ceil(ceil(base * rate) * effect)`
fn scaled_growth(base: u64, rate: f64, effect: f64) -> i64 {
    let step = (base as f64 * rate).ceil();
    (step * effect).ceil() as i64
}

/// One event type.
pub trait EventRule: Send + Sync {
    fn kind(&self) -> EventKind;

    /// Preconditions checked before `evaluate`.
    fn applies(&self, _ctx: &EventContext<'_>) -> bool {
        true
    }

    fn evaluate(&self, ctx: &EventContext<'_>, rng: &mut dyn RngCore) -> EventOutcome;
}

pub struct SelfSpread;

impl EventRule for SelfSpread {
    fn kind(&self) -> EventKind {
        EventKind::SelfSpread
    }

    fn evaluate(&self, ctx: &EventContext<'_>, rng: &mut dyn RngCore) -> EventOutcome {
        let country = ctx.country;
        let cfg = &ctx.config.events.self_spread;

        let bonus = (country.believers as f64 / 100_000.0 * cfg.believer_bonus)
            .min(cfg.believer_bonus_max);
        let mut chance = cfg.base_chance + bonus;
        chance *= 1.1 - country.wealth_level as f64 / 10.0;
        chance *= ctx.apostate_penalty();
        chance *= ctx.spread_modifier();

        let mut effect = ctx.tier_multiplier();
        if ctx.has(SkillId::SChosen) && country.is_wealthy() {
            chance *= 2.0;
            effect *= 2.0;
        }
        if ctx.has(SkillId::SDogma) {
            chance *= 1.5;
            effect *= 2.0;
        }
        if ctx.has(SkillId::SProgress) && country.is_wealthy() {
            chance *= 3.0;
            effect *= 2.0;
        }
        if ctx.has(SkillId::SReplace) && country.believer_ratio() < 0.5 {
            chance *= 2.0;
            effect *= 2.0;
        }

        if !roll(rng, chance) {
            return EventOutcome::none();
        }
        EventOutcome::believers(scaled_growth(country.believers, cfg.base_growth_rate, effect))
    }
}

pub struct AttractDissatisfied;

impl EventRule for AttractDissatisfied {
    fn kind(&self) -> EventKind {
        EventKind::AttractDissatisfied
    }

    fn applies(&self, ctx: &EventContext<'_>) -> bool {
        ctx.country.believer_ratio() < 0.5
    }

    fn evaluate(&self, ctx: &EventContext<'_>, rng: &mut dyn RngCore) -> EventOutcome {
        let country = ctx.country;
        let cfg = &ctx.config.events.attract_dissatisfied;

        let mut chance = cfg.base_chance * (11.0 - country.wealth_level as f64) / 10.0;
        chance *= ctx.apostate_penalty();
        chance *= ctx.spread_modifier();

        let mut effect = ctx.tier_multiplier();
        if ctx.has(SkillId::SDogma) {
            chance *= 1.5;
            effect *= 2.0;
        }
        if ctx.has(SkillId::SConspiracy) {
            chance *= 2.0;
            effect *= 2.0;
        }

        if !roll(rng, chance) {
            return EventOutcome::none();
        }
        EventOutcome::believers(scaled_growth(
            country.non_believers(),
            cfg.base_growth_rate,
            effect,
        ))
    }
}

pub struct RealHelp;

impl EventRule for RealHelp {
    fn kind(&self) -> EventKind {
        EventKind::RealHelp
    }

    fn evaluate(&self, ctx: &EventContext<'_>, rng: &mut dyn RngCore) -> EventOutcome {
        let country = ctx.country;
        let cfg = &ctx.config.events.real_help;
        let base = cfg.base_growth as f64;

        let mut chance = cfg.base_chance * country.gdp_ratio();
        chance *= 0.5 + (11.0 - country.wealth_level as f64) / 10.0;
        chance *= ctx.apostate_penalty();
        chance *= ctx.spread_modifier();

        let mut effect = ctx.tier_multiplier();
        let mut wealth = 0.0;
        if ctx.has(SkillId::SLogic) {
            chance *= 2.0;
            effect *= 2.0;
            wealth = (base * effect * 0.1).floor();
        }
        if ctx.has(SkillId::SFamily) {
            chance *= 4.0;
            effect *= 1.5;
            wealth += (base * effect * 0.2).floor();
        }

        if !roll(rng, chance) {
            return EventOutcome::none();
        }
        EventOutcome {
            wealth_delta: wealth,
            ..EventOutcome::believers((base * effect).ceil() as i64)
        }
    }
}

/// Decides whether the country tries to spread abroad; the resolver picks
/// the destination.
pub struct CrossBorderTrigger;

impl EventRule for CrossBorderTrigger {
    fn kind(&self) -> EventKind {
        EventKind::CrossBorderSpread
    }

    fn applies(&self, ctx: &EventContext<'_>) -> bool {
        ctx.country.believer_ratio() > 0.5
    }

    fn evaluate(&self, ctx: &EventContext<'_>, rng: &mut dyn RngCore) -> EventOutcome {
        let country = ctx.country;
        let ratio = country.believer_ratio();

        let mut chance = ctx.config.events.cross_border.base_chance;
        if ratio > 0.8 {
            chance *= 3.0;
        } else if ratio > 0.7 {
            chance *= 2.0;
        } else if ratio > 0.6 {
            chance *= 1.5;
        }
        chance *= 0.7 + (11.0 - country.wealth_level as f64) / 10.0 * 0.6;
        chance *= ctx.spread_modifier();

        if ctx.has(SkillId::SSlavery) && country.is_wealthy() {
            chance *= 2.5;
        }
        if ctx.has(SkillId::SRefugee) && country.is_poor() {
            chance *= 2.5;
        }

        if !roll(rng, chance) {
            return EventOutcome::none();
        }
        EventOutcome {
            triggered: true,
            cross_border: true,
            ..Default::default()
        }
    }
}

/// GDP loss driven by late spread skills. Deterministic once a skill applies.
pub struct WealthDrain;

impl WealthDrain {
    /// Fraction of current GDP drained this turn.
    pub fn drain_fraction(ctx: &EventContext<'_>) -> f64 {
        let country = ctx.country;
        let ratio = country.believer_ratio();
        let mut fraction = 0.0;
        if ctx.has(SkillId::SCorrupt) && ratio > 0.5 {
            fraction += 0.01;
        }
        if ctx.has(SkillId::SDivide) && ratio > 0.5 {
            fraction += 0.01;
        }
        if ctx.has(SkillId::SReplace) && ratio < 0.5 {
            fraction += 0.02;
        }
        if ctx.has(SkillId::SRefugee) && country.is_wealthy() && ratio > 0.3 {
            fraction += 0.05;
        }
        fraction
    }
}

impl EventRule for WealthDrain {
    fn kind(&self) -> EventKind {
        EventKind::WealthDrain
    }

    fn evaluate(&self, ctx: &EventContext<'_>, _rng: &mut dyn RngCore) -> EventOutcome {
        let fraction = Self::drain_fraction(ctx);
        let drained = ctx.country.gdp * fraction;
        if drained <= 0.0 {
            return EventOutcome::none();
        }
        EventOutcome {
            triggered: true,
            gdp_delta: -drained,
            ..Default::default()
        }
    }
}

/// Believers drift away when the economy has collapsed.
pub struct BelieverLoss;

impl EventRule for BelieverLoss {
    fn kind(&self) -> EventKind {
        EventKind::BelieverLoss
    }

    fn applies(&self, ctx: &EventContext<'_>) -> bool {
        let cfg = &ctx.config.believer_loss;
        cfg.enabled
            && ctx.country.believer_ratio() >= cfg.min_believer_ratio
            && ctx.country.gdp_ratio() < cfg.max_gdp_ratio
    }

    fn evaluate(&self, ctx: &EventContext<'_>, _rng: &mut dyn RngCore) -> EventOutcome {
        let cfg = &ctx.config.believer_loss;
        let gdp_ratio = ctx.country.gdp_ratio().clamp(0.0, 1.0);
        let rate = cfg.base_loss_rate * (1.0 - gdp_ratio);
        let lost = (ctx.country.believers as f64 * rate).ceil() as i64;
        if lost <= 0 {
            return EventOutcome::none();
        }
        log::debug!(
            "{} losing {} believers (GDP at {:.0}%)",
            ctx.country.id,
            lost,
            gdp_ratio * 100.0
        );
        EventOutcome::believers(-lost)
    }
}

/// All rules, indexed by [`EventKind`] in evaluation order.
pub struct EventTable {
    rules: Vec<Box<dyn EventRule>>,
}

impl EventTable {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Box::new(SelfSpread),
                Box::new(AttractDissatisfied),
                Box::new(RealHelp),
                Box::new(CrossBorderTrigger),
                Box::new(WealthDrain),
                Box::new(BelieverLoss),
            ],
        }
    }

    pub fn rule(&self, kind: EventKind) -> Option<&dyn EventRule> {
        self.rules
            .iter()
            .find(|r| r.kind() == kind)
            .map(|r| r.as_ref())
    }

    /// Evaluates every applicable rule independently; returns the ones that fired.
    pub fn evaluate_country(
        &self,
        ctx: &EventContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Vec<(EventKind, EventOutcome)> {
        let fully_converted = ctx.country.is_fully_converted();
        let mut fired = Vec::new();
        for rule in &self.rules {
            let kind = rule.kind();
            if fully_converted && kind.is_internal_growth() {
                continue;
            }
            if !rule.applies(ctx) {
                continue;
            }
            let outcome = rule.evaluate(ctx, rng);
            if outcome.triggered {
                fired.push((kind, outcome));
            }
        }
        fired
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountryBuilder;
    use rand::rngs::mock::StepRng;

    /// Every draw returns 0.0, so any positive chance fires.
    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Every draw is just below 1.0, so only a clamped chance of 1 fires.
    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn ctx<'a>(country: &'a Country, skills: &'a SkillSet, config: &'a SimConfig) -> EventContext<'a> {
        EventContext {
            country,
            skills,
            config,
            total_apostates: country.apostates,
            wealth: 0.0,
        }
    }

    #[test]
    fn test_self_spread_magnitude_in_rich_country() {
        let config = SimConfig::production();
        let skills = SkillSet::new();
        let us = CountryBuilder::new("US")
            .population(300_000_000)
            .wealth_level(10)
            .infected_with(1_000_000)
            .build();
        let outcome = SelfSpread.evaluate(&ctx(&us, &skills, &config), &mut always());
        assert!(outcome.triggered);
        // ceil(1_000_000 * 0.01) * tier 1
        assert_eq!(outcome.believers_delta, 10_000);
    }

    #[test]
    fn test_self_spread_skill_bonuses_stack() {
        let config = SimConfig::production();
        let mut skills = SkillSet::new();
        skills.force_unlock(SkillId::SChosen);
        skills.force_unlock(SkillId::SDogma);
        let us = CountryBuilder::new("US")
            .population(300_000_000)
            .wealth_level(10)
            .infected_with(1_000_000)
            .build();
        let outcome = SelfSpread.evaluate(&ctx(&us, &skills, &config), &mut always());
        assert_eq!(outcome.believers_delta, 40_000);
    }

    #[test]
    fn test_self_spread_rarely_fires_in_rich_country() {
        let config = SimConfig::production();
        let skills = SkillSet::new();
        let us = CountryBuilder::new("US").wealth_level(10).infected_with(100).build();
        assert!(!SelfSpread.evaluate(&ctx(&us, &skills, &config), &mut never()).triggered);
    }

    #[test]
    fn test_apostate_penalty() {
        let config = SimConfig::production();
        let skills = SkillSet::new();
        let country = CountryBuilder::new("AA").infected_with(10).apostates(50).build();
        let mut context = ctx(&country, &skills, &config);
        context.total_apostates = 100;
        assert!((context.apostate_penalty() - 0.5_f64.powf(0.5)).abs() < 1e-12);
        context.total_apostates = 50;
        assert_eq!(context.apostate_penalty(), 0.5);
    }

    #[test]
    fn test_attract_only_below_half() {
        let config = SimConfig::production();
        let skills = SkillSet::new();
        let low = CountryBuilder::new("AA").population(1000).infected_with(100).build();
        let high = CountryBuilder::new("AA").population(1000).infected_with(600).build();
        assert!(AttractDissatisfied.applies(&ctx(&low, &skills, &config)));
        assert!(!AttractDissatisfied.applies(&ctx(&high, &skills, &config)));

        let outcome = AttractDissatisfied.evaluate(&ctx(&low, &skills, &config), &mut always());
        // ceil(900 * 0.01) = 9, tier 1
        assert_eq!(outcome.believers_delta, 9);
    }

    #[test]
    fn test_real_help_wealth_with_logic_and_family() {
        let config = SimConfig::production();
        let mut skills = SkillSet::new();
        skills.force_unlock(SkillId::SLogic);
        skills.force_unlock(SkillId::SFamily);
        let country = CountryBuilder::new("AA").wealth_level(2).infected_with(10).build();
        let outcome = RealHelp.evaluate(&ctx(&country, &skills, &config), &mut always());
        // effect 1 * 2 * 1.5 = 3; wealth floor(50*2*0.1) + floor(50*3*0.2)
        assert_eq!(outcome.believers_delta, 150);
        assert_eq!(outcome.wealth_delta, 10.0 + 30.0);
    }

    #[test]
    fn test_cross_border_trigger_requires_majority() {
        let config = SimConfig::production();
        let skills = SkillSet::new();
        let half = CountryBuilder::new("AA").population(1000).infected_with(500).build();
        let most = CountryBuilder::new("AA").population(1000).infected_with(900).build();
        assert!(!CrossBorderTrigger.applies(&ctx(&half, &skills, &config)));
        assert!(CrossBorderTrigger.applies(&ctx(&most, &skills, &config)));
        let outcome = CrossBorderTrigger.evaluate(&ctx(&most, &skills, &config), &mut always());
        assert!(outcome.cross_border);
        assert_eq!(outcome.believers_delta, 0);
    }

    #[test]
    fn test_wealth_drain_needs_skills() {
        let config = SimConfig::production();
        let mut skills = SkillSet::new();
        let country = CountryBuilder::new("US")
            .population(1000)
            .wealth_level(10)
            .infected_with(600)
            .build();
        assert!(!WealthDrain.evaluate(&ctx(&country, &skills, &config), &mut always()).triggered);

        skills.force_unlock(SkillId::SCorrupt);
        skills.force_unlock(SkillId::SRefugee);
        let outcome = WealthDrain.evaluate(&ctx(&country, &skills, &config), &mut never());
        assert!(outcome.triggered);
        assert!((outcome.gdp_delta + 28.0 * 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_believer_loss_on_gdp_collapse() {
        let config = SimConfig::production();
        let skills = SkillSet::new();
        let country = CountryBuilder::new("AA")
            .population(1000)
            .infected_with(800)
            .original_gdp(1.0)
            .gdp(0.1)
            .build();
        let context = ctx(&country, &skills, &config);
        assert!(BelieverLoss.applies(&context));
        // ceil(800 * 0.02 * 0.9) = 15
        assert_eq!(BelieverLoss.evaluate(&context, &mut never()).believers_delta, -15);

        let healthy = CountryBuilder::new("AA").population(1000).infected_with(800).build();
        assert!(!BelieverLoss.applies(&ctx(&healthy, &skills, &config)));
    }

    #[test]
    fn test_fully_converted_skips_internal_growth() {
        let config = SimConfig::production();
        let skills = SkillSet::new();
        let country = CountryBuilder::new("AA").population(1000).infected_with(1000).build();
        let fired = EventTable::standard().evaluate_country(&ctx(&country, &skills, &config), &mut always());
        let kinds: Vec<EventKind> = fired.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![EventKind::CrossBorderSpread]);
    }

    #[test]
    fn test_table_covers_every_kind() {
        let table = EventTable::standard();
        for kind in EventKind::ALL {
            assert_eq!(table.rule(kind).map(|r| r.kind()), Some(kind));
        }
    }

    #[test]
    fn test_roll_clamps() {
        assert!(roll(&mut never(), 5.0));
        assert!(!roll(&mut always(), -1.0));
        assert!(!roll(&mut always(), f64::NAN));
    }
}
