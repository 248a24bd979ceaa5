//! Skill catalogue, unlocking, and the modifier query used by other systems.
//!
//! Skills live in four trees. The wealth, spread and trait trees gate on
//! *all* listed prerequisites; the virtue grid gates on *any* adjacent cell.
//! Every effect is a scalar multiplier and unlocked skills compose by
//! multiplication, so evaluation order does not matter.

use crate::config::SkillCostConfig;
use crate::state::Country;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    W1,
    W2,
    W3,
    Compassion,
    SChosen,
    SLogic,
    SSlavery,
    SRefugee,
    SDogma,
    SProgress,
    SConspiracy,
    SFamily,
    SCorrupt,
    SDivide,
    SReplace,
    T1,
    T2,
    T3,
    OriginalSin,
    Priest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTree {
    Wealth,
    Spread,
    Trait,
    /// Grid layout, unlocked from any adjacent cell.
    Virtue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    None,
    AllOf(&'static [SkillId]),
    AnyAdjacent(&'static [SkillId]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillDef {
    pub id: SkillId,
    pub tree: SkillTree,
    pub base_cost: f64,
    pub tier: u32,
    pub prerequisite: Prerequisite,
}

impl SkillId {
    pub const ALL: [SkillId; 20] = [
        SkillId::W1,
        SkillId::W2,
        SkillId::W3,
        SkillId::Compassion,
        SkillId::SChosen,
        SkillId::SLogic,
        SkillId::SSlavery,
        SkillId::SRefugee,
        SkillId::SDogma,
        SkillId::SProgress,
        SkillId::SConspiracy,
        SkillId::SFamily,
        SkillId::SCorrupt,
        SkillId::SDivide,
        SkillId::SReplace,
        SkillId::T1,
        SkillId::T2,
        SkillId::T3,
        SkillId::OriginalSin,
        SkillId::Priest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkillId::W1 => "w1",
            SkillId::W2 => "w2",
            SkillId::W3 => "w3",
            SkillId::Compassion => "compassion",
            SkillId::SChosen => "s_chosen",
            SkillId::SLogic => "s_logic",
            SkillId::SSlavery => "s_slavery",
            SkillId::SRefugee => "s_refugee",
            SkillId::SDogma => "s_dogma",
            SkillId::SProgress => "s_progress",
            SkillId::SConspiracy => "s_conspiracy",
            SkillId::SFamily => "s_family",
            SkillId::SCorrupt => "s_corrupt",
            SkillId::SDivide => "s_divide",
            SkillId::SReplace => "s_replace",
            SkillId::T1 => "t1",
            SkillId::T2 => "t2",
            SkillId::T3 => "t3",
            SkillId::OriginalSin => "original_sin",
            SkillId::Priest => "priest",
        }
    }

    pub fn def(self) -> SkillDef {
        use Prerequisite::{AllOf, AnyAdjacent};
        use SkillId::*;
        let (tree, base_cost, tier, prerequisite) = match self {
            W1 => (SkillTree::Wealth, 10.0, 1, Prerequisite::None),
            W2 => (SkillTree::Wealth, 20.0, 2, AllOf(&[W1])),
            W3 => (SkillTree::Wealth, 30.0, 3, AllOf(&[W2])),
            Compassion | SChosen | SLogic => (SkillTree::Spread, 0.0, 1, Prerequisite::None),
            SSlavery => (SkillTree::Spread, 1000.0, 2, AllOf(&[SChosen])),
            SRefugee => (SkillTree::Spread, 1000.0, 2, AllOf(&[Compassion])),
            SDogma => (SkillTree::Spread, 1000.0, 2, AllOf(&[SLogic])),
            SProgress => (SkillTree::Spread, 10_000.0, 3, AllOf(&[SDogma, SSlavery])),
            SConspiracy => (SkillTree::Spread, 10_000.0, 3, AllOf(&[SSlavery, SRefugee])),
            SFamily => (SkillTree::Spread, 10_000.0, 3, AllOf(&[SDogma])),
            SCorrupt | SDivide => (SkillTree::Spread, 100_000.0, 4, AllOf(&[SConspiracy])),
            SReplace => (
                SkillTree::Spread,
                100_000.0,
                4,
                AllOf(&[SConspiracy, SFamily, SDogma, SRefugee]),
            ),
            T1 => (SkillTree::Trait, 10.0, 1, Prerequisite::None),
            T2 => (SkillTree::Trait, 20.0, 2, AllOf(&[T1])),
            T3 => (SkillTree::Trait, 30.0, 3, AllOf(&[T2])),
            OriginalSin => (SkillTree::Virtue, 50.0, 2, AnyAdjacent(&[Compassion])),
            Priest => (SkillTree::Virtue, 50.0, 2, AnyAdjacent(&[Compassion, OriginalSin])),
        };
        SkillDef {
            id: self,
            tree,
            base_cost,
            tier,
            prerequisite,
        }
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillId {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SkillId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| SkillError::Unknown(s.to_string()))
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum SkillError {
    #[error("Unknown skill: {0}")]
    Unknown(String),
    #[error("Skill {0} is already unlocked")]
    AlreadyUnlocked(SkillId),
    #[error("Prerequisites for {0} are not met")]
    PrerequisitesNotMet(SkillId),
    #[error("Insufficient wealth for {skill}: required {required}, available {available}")]
    InsufficientWealth {
        skill: SkillId,
        required: f64,
        available: f64,
    },
}

/// Effects other systems can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectType {
    SpreadProbability,
    OpponentProbability,
    WealthTransferRate,
    CounterAttackSuccess,
    CounterAttackDamage,
    /// Cross-border success from a poor source into a wealthy target.
    PoorToRichSpread,
}

/// Inputs a modifier may depend on.
#[derive(Debug, Clone, Copy)]
pub struct ModifierContext<'a> {
    /// Current global wealth.
    pub wealth: f64,
    /// Wealth below which compassion bonuses apply.
    pub wealth_cutoff: f64,
    pub source: Option<&'a Country>,
    pub target: Option<&'a Country>,
}

impl<'a> ModifierContext<'a> {
    pub fn new(wealth: f64, wealth_cutoff: f64) -> Self {
        Self {
            wealth,
            wealth_cutoff,
            source: None,
            target: None,
        }
    }

    pub fn with_route(mut self, source: &'a Country, target: &'a Country) -> Self {
        self.source = Some(source);
        self.target = Some(target);
        self
    }

    fn is_low_wealth(&self) -> bool {
        self.wealth < self.wealth_cutoff
    }

    fn is_high_wealth(&self) -> bool {
        self.wealth > self.wealth_cutoff
    }
}

/// Good-person event strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoodPersonEffect {
    pub modifier: f64,
    /// Crowned events also convert apostates back to believers.
    pub crowned: bool,
}

/// The set of unlocked skills. Only ever grows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillSet {
    unlocked: BTreeSet<SkillId>,
}

impl SkillSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, skill: SkillId) -> bool {
        self.unlocked.contains(&skill)
    }

    pub fn unlocked(&self) -> impl Iterator<Item = SkillId> + '_ {
        self.unlocked.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.unlocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty()
    }

    pub fn prerequisites_met(&self, skill: SkillId) -> bool {
        match skill.def().prerequisite {
            Prerequisite::None => true,
            Prerequisite::AllOf(required) => required.iter().all(|s| self.has(*s)),
            Prerequisite::AnyAdjacent(adjacent) => adjacent.iter().any(|s| self.has(*s)),
        }
    }

    /// `base_cost + unlocked_count * multiplier * tier`, where the multiplier
    /// steps up once the escalation threshold is reached.
    pub fn unlock_cost(&self, skill: SkillId, config: &SkillCostConfig) -> f64 {
        let def = skill.def();
        let count = self.unlocked.len();
        let multiplier = if count < config.escalation_threshold {
            config.base_multiplier
        } else {
            config.escalated_multiplier
        };
        def.base_cost + count as f64 * multiplier * def.tier as f64
    }

    /// Whether `skill` could be unlocked right now with `wealth`.
    pub fn can_unlock(&self, skill: SkillId, wealth: f64, config: &SkillCostConfig) -> bool {
        !self.has(skill)
            && self.prerequisites_met(skill)
            && wealth >= self.unlock_cost(skill, config)
    }

    /// Unlocks `skill`, deducting its cost from `wealth`.
    ///
    /// All checks run before anything is mutated. Returns the cost paid.
    pub fn unlock(
        &mut self,
        skill: SkillId,
        wealth: &mut f64,
        config: &SkillCostConfig,
    ) -> Result<f64, SkillError> {
        if self.has(skill) {
            return Err(SkillError::AlreadyUnlocked(skill));
        }
        if !self.prerequisites_met(skill) {
            return Err(SkillError::PrerequisitesNotMet(skill));
        }
        let cost = self.unlock_cost(skill, config);
        if *wealth < cost {
            return Err(SkillError::InsufficientWealth {
                skill,
                required: cost,
                available: *wealth,
            });
        }
        *wealth -= cost;
        self.unlocked.insert(skill);
        log::info!("Unlocked skill {} for {:.1} wealth", skill, cost);
        Ok(cost)
    }

    /// Unlocks without cost or prerequisite checks.
    pub fn force_unlock(&mut self, skill: SkillId) {
        self.unlocked.insert(skill);
    }

    /// Product of every unlocked skill's contribution to `effect`.
    pub fn modifier(&self, effect: EffectType, ctx: &ModifierContext<'_>) -> f64 {
        self.unlocked
            .iter()
            .map(|skill| self.contribution(*skill, effect, ctx))
            .product()
    }

    fn contribution(&self, skill: SkillId, effect: EffectType, ctx: &ModifierContext<'_>) -> f64 {
        use EffectType::*;
        match (skill, effect) {
            (SkillId::Compassion, SpreadProbability) => {
                if ctx.is_low_wealth() {
                    2.0
                } else if ctx.is_high_wealth() && !self.has(SkillId::Priest) {
                    0.5
                } else {
                    1.0
                }
            }
            (SkillId::Compassion, OpponentProbability) => {
                if ctx.is_low_wealth() {
                    0.5
                } else if ctx.is_high_wealth() {
                    1.5
                } else {
                    1.0
                }
            }
            (SkillId::Compassion, WealthTransferRate) => 0.5,
            (SkillId::Compassion, CounterAttackSuccess | CounterAttackDamage) => {
                if ctx.is_low_wealth() {
                    2.0
                } else {
                    1.0
                }
            }
            (SkillId::Compassion, PoorToRichSpread) => match (ctx.source, ctx.target) {
                (Some(src), Some(dst)) if src.is_poor() && dst.is_wealthy() => 3.0,
                _ => 1.0,
            },
            (SkillId::OriginalSin, SpreadProbability) => 2.0,
            (SkillId::Priest, OpponentProbability) => 1.2,
            (SkillId::W1, WealthTransferRate) => 1.1,
            (SkillId::W2, WealthTransferRate) => 1.2,
            (SkillId::W3, WealthTransferRate) => 1.3,
            (SkillId::T1, CounterAttackSuccess) => 1.2,
            (SkillId::T2, CounterAttackDamage) => 1.5,
            (SkillId::T3, OpponentProbability) => 0.8,
            _ => 1.0,
        }
    }

    /// Good-person strength; crowned below the compassion wealth cutoff.
    pub fn good_person_effect(&self, ctx: &ModifierContext<'_>) -> GoodPersonEffect {
        if self.has(SkillId::Compassion) && ctx.is_low_wealth() {
            GoodPersonEffect {
                modifier: 2.0,
                crowned: true,
            }
        } else {
            GoodPersonEffect {
                modifier: 1.0,
                crowned: false,
            }
        }
    }

    /// Compassion suppresses uncrowned good-person events in wealthy countries.
    pub fn should_skip_good_person(&self, country: &Country, crowned: bool) -> bool {
        self.has(SkillId::Compassion) && !crowned && country.is_wealthy()
    }

    /// Whether drain skills are allowed to push GDP under the wealth floor.
    pub fn breaks_wealth_floor(&self) -> bool {
        [
            SkillId::SCorrupt,
            SkillId::SDivide,
            SkillId::SReplace,
            SkillId::SRefugee,
        ]
        .iter()
        .any(|s| self.has(*s))
    }
}
