use crate::config::SimConfig;
use crate::skills::{EffectType, ModifierContext};
use crate::state::WorldState;
use tracing::instrument;

/// Moves GDP from every infected country into global wealth.
///
/// Formula:
/// 1. amount = gdp × believer_ratio × base_transfer_rate × skill modifier
/// 2. Cap so GDP stays at or above `original_gdp × min_wealth_ratio`
/// 3. Credit `amount × wealth_per_gdp` to global wealth
///
/// Returns the wealth credited this turn.
#[instrument(skip_all, name = "wealth_transfer")]
pub fn run_wealth_transfer(state: &mut WorldState, config: &SimConfig) -> f64 {
    let cfg = &config.wealth_transfer;
    let ctx = ModifierContext::new(state.global.wealth, config.skills.compassion_wealth_cutoff);
    let modifier = state.skills.modifier(EffectType::WealthTransferRate, &ctx);

    let mut transferred = 0.0;
    for country in state.countries.values_mut().filter(|c| c.infected) {
        let wanted = country.gdp * country.believer_ratio() * cfg.base_transfer_rate * modifier;
        let headroom = (country.gdp - country.wealth_floor(cfg.min_wealth_ratio)).max(0.0);
        let amount = wanted.clamp(0.0, headroom);
        if amount > 0.0 {
            country.gdp -= amount;
            transferred += amount;
        }
    }

    let credited = transferred * cfg.wealth_per_gdp;
    state.global.wealth += credited;
    credited
}

/// Apostates rebuild the economy of the countries they live in.
///
/// Total generated GDP is `total_apostates × apostate_wealth_per_capita`,
/// split by each country's share of apostates. GDP never regrows past
/// `original_gdp`. Returns the GDP restored.
#[instrument(skip_all, name = "apostate_regeneration")]
pub fn run_apostate_regeneration(state: &mut WorldState, config: &SimConfig) -> f64 {
    let total = state.total_apostates();
    if total == 0 {
        return 0.0;
    }
    let generated = total as f64 * config.wealth_transfer.apostate_wealth_per_capita;

    let mut restored = 0.0;
    for country in state.countries.values_mut().filter(|c| c.apostates > 0) {
        if country.gdp >= country.original_gdp {
            continue;
        }
        let share = country.apostates as f64 / total as f64;
        let next = (country.gdp + generated * share).min(country.original_gdp);
        restored += next - country.gdp;
        country.gdp = next;
    }
    restored
}
