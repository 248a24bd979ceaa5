//! Per-turn systems. Each takes `&mut WorldState` and runs once per turn in
//! the order fixed by [`Simulation::process_turn`](crate::step::Simulation::process_turn).

pub mod economy;
pub mod spread;

pub use economy::{run_apostate_regeneration, run_wealth_transfer};
pub use spread::run_spread_tick;
