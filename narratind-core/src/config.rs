//! Simulation configuration.
//!
//! A [`SimConfig`] is resolved once before the turn loop starts and handed to
//! [`Simulation::new`](crate::step::Simulation::new). Two presets exist:
//! [`SimConfig::production`] (normal balance) and [`SimConfig::testing`]
//! (accelerated balance for playtesting). Either can be overridden from a
//! JSON file; missing fields fall back to the production preset.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Which preset a configuration started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigMode {
    #[default]
    Production,
    Testing,
}

/// Difficulty level for the opponent manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// Per-difficulty opponent tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    /// Minimum believer ratio before a country can host a philosopher.
    pub country_believer_ratio: f64,
    /// Minimum believer count before a country can host a philosopher.
    pub min_country_believers: u64,
    pub health_multiplier: f64,
    pub damage_multiplier: f64,
    pub probability_multiplier: f64,
}

impl Difficulty {
    pub fn profile(self) -> DifficultyProfile {
        match self {
            Difficulty::Easy => DifficultyProfile {
                country_believer_ratio: 0.7,
                min_country_believers: 50_000,
                health_multiplier: 0.8,
                damage_multiplier: 0.8,
                probability_multiplier: 0.7,
            },
            Difficulty::Normal => DifficultyProfile {
                country_believer_ratio: 0.5,
                min_country_believers: 50_000,
                health_multiplier: 1.0,
                damage_multiplier: 1.0,
                probability_multiplier: 1.0,
            },
            Difficulty::Hard => DifficultyProfile {
                country_believer_ratio: 0.3,
                min_country_believers: 20_000,
                health_multiplier: 1.3,
                damage_multiplier: 1.2,
                probability_multiplier: 1.5,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelfSpreadConfig {
    pub base_chance: f64,
    /// Chance added per 100k believers.
    pub believer_bonus: f64,
    pub believer_bonus_max: f64,
    pub base_growth_rate: f64,
}

impl Default for SelfSpreadConfig {
    fn default() -> Self {
        Self {
            base_chance: 0.2,
            believer_bonus: 0.01,
            believer_bonus_max: 0.5,
            base_growth_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AttractConfig {
    pub base_chance: f64,
    pub base_growth_rate: f64,
}

impl Default for AttractConfig {
    fn default() -> Self {
        Self {
            base_chance: 0.15,
            base_growth_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RealHelpConfig {
    pub base_chance: f64,
    /// Fixed believer gain before the tier multiplier.
    pub base_growth: u64,
}

impl Default for RealHelpConfig {
    fn default() -> Self {
        Self {
            base_chance: 0.1,
            base_growth: 50,
        }
    }
}

/// Cross-border trigger and resolver tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrossBorderConfig {
    pub base_chance: f64,
    /// Believers seeded into a newly infected country.
    pub initial_believers: u64,
    pub land_weight: f64,
    pub sea_weight: f64,
    pub air_weight: f64,
    pub sea_sample_size: usize,
    pub air_sample_size: usize,
    /// Success rate is `decay_base^(gdp_gap / decay_scale)` for richer targets.
    pub decay_base: f64,
    pub decay_scale: f64,
    pub min_success_rate: f64,
}

impl Default for CrossBorderConfig {
    fn default() -> Self {
        Self {
            base_chance: 0.08,
            initial_believers: 10,
            land_weight: 10.0,
            sea_weight: 3.0,
            air_weight: 1.0,
            sea_sample_size: 5,
            air_sample_size: 5,
            decay_base: 0.05,
            decay_scale: 5.0,
            min_success_rate: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EventsConfig {
    pub self_spread: SelfSpreadConfig,
    pub attract_dissatisfied: AttractConfig,
    pub real_help: RealHelpConfig,
    pub cross_border: CrossBorderConfig,
}

/// One step of the believer-ratio effect multiplier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BelieverTier {
    pub threshold: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameStartConfig {
    pub initial_believers: u64,
}

impl Default for GameStartConfig {
    fn default() -> Self {
        Self {
            initial_believers: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WealthTransferConfig {
    pub base_transfer_rate: f64,
    /// GDP floor as a fraction of the original GDP.
    pub min_wealth_ratio: f64,
    /// Whether drain skills may push GDP under the floor.
    pub skill_can_break_limit: bool,
    /// Global wealth credited per unit of GDP (GDP is in trillions).
    pub wealth_per_gdp: f64,
    /// GDP regenerated per apostate per turn.
    pub apostate_wealth_per_capita: f64,
}

impl Default for WealthTransferConfig {
    fn default() -> Self {
        Self {
            base_transfer_rate: 0.01,
            min_wealth_ratio: 0.05,
            skill_can_break_limit: true,
            wealth_per_gdp: 1000.0,
            apostate_wealth_per_capita: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BelieverLossConfig {
    pub enabled: bool,
    pub min_believer_ratio: f64,
    pub max_gdp_ratio: f64,
    pub base_loss_rate: f64,
}

impl Default for BelieverLossConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_believer_ratio: 0.5,
            max_gdp_ratio: 0.3,
            base_loss_rate: 0.02,
        }
    }
}

/// Philosopher (opponent) tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpponentConfig {
    /// Run the opponent check every N turns.
    pub check_interval: u32,
    pub spawn_probability: f64,
    /// Turns an active philosopher stays before timing out.
    pub display_turns: u32,
    pub initial_health: i64,
    pub base_damage: f64,
    pub migration_probability: f64,
    /// Turns a destroyed identity stays unavailable.
    pub disable_turns: u32,
    pub invasion_threshold: i64,
    pub invading_click_bonus: f64,
    pub invading_click_cap: f64,
    /// Fraction used by the timeout loss formula.
    pub loss_rate: f64,
    pub growth_min: i64,
    pub growth_max: i64,
    pub recover_min: i64,
    pub recover_max: i64,
}

impl Default for OpponentConfig {
    fn default() -> Self {
        Self {
            check_interval: 1,
            spawn_probability: 0.05,
            display_turns: 5,
            initial_health: 100,
            base_damage: 30.0,
            migration_probability: 0.3,
            disable_turns: 20,
            invasion_threshold: 150,
            invading_click_bonus: 1.8,
            invading_click_cap: 0.95,
            loss_rate: 0.01,
            growth_min: 1,
            growth_max: 5,
            recover_min: 5,
            recover_max: 15,
        }
    }
}

/// "Good person" special event tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpecialEventConfig {
    pub check_interval: u32,
    pub good_person_probability: f64,
    pub duration_turns: u32,
    pub max_active: usize,
    pub min_ratio: f64,
    pub max_ratio: f64,
    /// Claim gain as a multiple of one self-spread growth step.
    pub effect_multiplier: f64,
}

impl Default for SpecialEventConfig {
    fn default() -> Self {
        Self {
            check_interval: 1,
            good_person_probability: 0.05,
            duration_turns: 5,
            max_active: 1,
            min_ratio: 0.01,
            max_ratio: 0.99,
            effect_multiplier: 3.0,
        }
    }
}

/// Skill unlock cost escalation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkillCostConfig {
    /// Unlocked count from which the escalation multiplier steps up.
    pub escalation_threshold: usize,
    pub base_multiplier: f64,
    pub escalated_multiplier: f64,
    /// Wealth below which compassion bonuses apply.
    pub compassion_wealth_cutoff: f64,
}

impl Default for SkillCostConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 5,
            base_multiplier: 1.0,
            escalated_multiplier: 2.0,
            compassion_wealth_cutoff: 10.0,
        }
    }
}

/// Simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub mode: ConfigMode,
    pub difficulty: Difficulty,
    pub events: EventsConfig,
    pub believer_tiers: Vec<BelieverTier>,
    pub game_start: GameStartConfig,
    pub wealth_transfer: WealthTransferConfig,
    pub believer_loss: BelieverLossConfig,
    pub opponents: OpponentConfig,
    pub special_events: SpecialEventConfig,
    pub skills: SkillCostConfig,
    /// Apostates across infected countries needed before defeat can fire.
    pub defeat_apostate_threshold: u64,
    /// Compute checksum every N turns (0 = disabled).
    pub checksum_frequency: u32,
    /// Wall-clock turn interval for real-time drivers.
    pub turn_interval_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl SimConfig {
    pub fn production() -> Self {
        Self {
            mode: ConfigMode::Production,
            difficulty: Difficulty::Normal,
            events: EventsConfig::default(),
            believer_tiers: vec![
                BelieverTier { threshold: 0.2, multiplier: 1.0 },
                BelieverTier { threshold: 0.4, multiplier: 3.0 },
                BelieverTier { threshold: 0.6, multiplier: 9.0 },
                BelieverTier { threshold: 0.8, multiplier: 20.0 },
                BelieverTier { threshold: 1.0, multiplier: 50.0 },
            ],
            game_start: GameStartConfig::default(),
            wealth_transfer: WealthTransferConfig::default(),
            believer_loss: BelieverLossConfig::default(),
            opponents: OpponentConfig::default(),
            special_events: SpecialEventConfig::default(),
            skills: SkillCostConfig::default(),
            defeat_apostate_threshold: 1000,
            checksum_frequency: 10,
            turn_interval_ms: 2000,
        }
    }

    /// Accelerated balance used for playtesting.
    pub fn testing() -> Self {
        let mut config = Self::production();
        config.mode = ConfigMode::Testing;
        config.events.self_spread = SelfSpreadConfig {
            base_chance: 0.8,
            believer_bonus: 0.05,
            believer_bonus_max: 2.0,
            base_growth_rate: 0.05,
        };
        config.events.attract_dissatisfied = AttractConfig {
            base_chance: 0.7,
            base_growth_rate: 0.05,
        };
        config.events.real_help = RealHelpConfig {
            base_chance: 0.6,
            base_growth: 500,
        };
        config.events.cross_border.initial_believers = 1000;
        for (tier, multiplier) in config
            .believer_tiers
            .iter_mut()
            .zip([2.0, 5.0, 15.0, 40.0, 100.0])
        {
            tier.multiplier = multiplier;
        }
        config.game_start.initial_believers = 10_000;
        config.wealth_transfer.base_transfer_rate = 0.05;
        config.believer_loss.base_loss_rate = 0.05;
        config.special_events.good_person_probability = 0.4;
        config.turn_interval_ms = 1000;
        config
    }

    pub fn for_mode(mode: ConfigMode) -> Self {
        match mode {
            ConfigMode::Production => Self::production(),
            ConfigMode::Testing => Self::testing(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Load a configuration from JSON and validate it.
    ///
    /// Fields the document omits come from the preset named by its `mode`
    /// (production when absent).
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let overrides: Value = serde_json::from_str(json)?;
        let mode = match overrides.get("mode") {
            Some(mode) => serde_json::from_value(mode.clone())?,
            None => ConfigMode::default(),
        };
        let mut merged = serde_json::to_value(Self::for_mode(mode))?;
        merge_json(&mut merged, overrides);
        let config: SimConfig = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Multiplier for the believer-ratio tier `ratio` falls into.
    ///
    /// The first tier whose threshold exceeds `ratio` wins; a ratio at or past
    /// every threshold uses the last tier.
    pub fn tier_multiplier(&self, ratio: f64) -> f64 {
        self.believer_tiers
            .iter()
            .find(|tier| ratio < tier.threshold)
            .or(self.believer_tiers.last())
            .map(|tier| tier.multiplier)
            .unwrap_or(1.0)
    }

    /// Structural checks. Probabilities above 1 are allowed (they are
    /// clamped at draw time) but negative values are not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value < 0.0 || value.is_nan() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be >= 0, got {value}"),
                });
            }
            Ok(())
        }

        let events = &self.events;
        non_negative("events.self_spread.base_chance", events.self_spread.base_chance)?;
        non_negative(
            "events.self_spread.base_growth_rate",
            events.self_spread.base_growth_rate,
        )?;
        non_negative(
            "events.attract_dissatisfied.base_chance",
            events.attract_dissatisfied.base_chance,
        )?;
        non_negative("events.real_help.base_chance", events.real_help.base_chance)?;
        non_negative("events.cross_border.base_chance", events.cross_border.base_chance)?;
        non_negative("events.cross_border.min_success_rate", events.cross_border.min_success_rate)?;
        non_negative("opponents.spawn_probability", self.opponents.spawn_probability)?;
        non_negative(
            "special_events.good_person_probability",
            self.special_events.good_person_probability,
        )?;

        if events.cross_border.decay_scale <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "events.cross_border.decay_scale",
                reason: "must be > 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.wealth_transfer.min_wealth_ratio) {
            return Err(ConfigError::Invalid {
                field: "wealth_transfer.min_wealth_ratio",
                reason: format!("must be in [0, 1], got {}", self.wealth_transfer.min_wealth_ratio),
            });
        }
        if self.believer_tiers.is_empty() {
            return Err(ConfigError::Invalid {
                field: "believer_tiers",
                reason: "at least one tier is required".into(),
            });
        }
        if self
            .believer_tiers
            .windows(2)
            .any(|pair| pair[0].threshold >= pair[1].threshold)
        {
            return Err(ConfigError::Invalid {
                field: "believer_tiers",
                reason: "thresholds must be strictly increasing".into(),
            });
        }
        if self.opponents.initial_health <= 0 {
            return Err(ConfigError::Invalid {
                field: "opponents.initial_health",
                reason: "must be > 0".into(),
            });
        }
        if self.opponents.growth_min > self.opponents.growth_max
            || self.opponents.recover_min > self.opponents.recover_max
        {
            return Err(ConfigError::Invalid {
                field: "opponents",
                reason: "random ranges must have min <= max".into(),
            });
        }
        if self.opponents.check_interval == 0 || self.special_events.check_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "check_interval",
                reason: "must be >= 1".into(),
            });
        }
        Ok(())
    }
}

/// Objects merge key by key; any other value replaces the base outright.
fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        SimConfig::production().validate().unwrap();
        SimConfig::testing().validate().unwrap();
    }

    #[test]
    fn test_tier_multiplier_boundaries() {
        let config = SimConfig::production();
        assert_eq!(config.tier_multiplier(0.0), 1.0);
        assert_eq!(config.tier_multiplier(0.19), 1.0);
        assert_eq!(config.tier_multiplier(0.2), 3.0);
        assert_eq!(config.tier_multiplier(0.5), 9.0);
        assert_eq!(config.tier_multiplier(0.79), 20.0);
        assert_eq!(config.tier_multiplier(0.95), 50.0);
        assert_eq!(config.tier_multiplier(1.0), 50.0);
    }

    #[test]
    fn test_testing_preset_is_accelerated() {
        let testing = SimConfig::testing();
        assert_eq!(testing.mode, ConfigMode::Testing);
        assert_eq!(testing.game_start.initial_believers, 10_000);
        assert_eq!(testing.events.cross_border.initial_believers, 1000);
        assert_eq!(testing.tier_multiplier(0.1), 2.0);
    }

    #[test]
    fn test_partial_json_falls_back_to_production() {
        let config =
            SimConfig::from_json_str(r#"{"game_start":{"initial_believers":5}}"#).unwrap();
        assert_eq!(config.game_start.initial_believers, 5);
        assert_eq!(config.events.self_spread.base_chance, 0.2);
        assert_eq!(config.difficulty, Difficulty::Normal);
    }

    #[test]
    fn test_partial_json_follows_declared_mode() {
        let json = r#"{"mode":"testing","game_start":{"initial_believers":5}}"#;
        let config = SimConfig::from_json_str(json).unwrap();
        assert_eq!(config.mode, ConfigMode::Testing);
        assert_eq!(config.game_start.initial_believers, 5);
        assert_eq!(config.events.self_spread.base_chance, 0.8);
        assert_eq!(config.special_events.good_person_probability, 0.4);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let err = SimConfig::from_json_str(r#"{"mode":"staging"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_unsorted_tiers() {
        let json = r#"{"believer_tiers":[{"threshold":0.5,"multiplier":1},{"threshold":0.2,"multiplier":2}]}"#;
        let err = SimConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "believer_tiers", .. }));
    }

    #[test]
    fn test_rejects_negative_probability() {
        let json = r#"{"opponents":{"spawn_probability":-0.1}}"#;
        assert!(SimConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_difficulty_profiles() {
        assert_eq!(Difficulty::Normal.profile().country_believer_ratio, 0.5);
        assert_eq!(Difficulty::Hard.profile().min_country_believers, 20_000);
        assert_eq!(Difficulty::Easy.profile().probability_multiplier, 0.7);
    }
}
