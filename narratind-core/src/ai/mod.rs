//! Scripted players.
//!
//! A player sees a [`VisibleWorldState`] and the commands that are legal
//! right now, and answers with the commands it wants to issue this turn.
//! The action space is the finite `available_commands` list, so a player
//! only ever picks from it and can never produce an invalid command shape.
//!
//! # Determinism
//!
//! Implementations must be deterministic given the same seed so that runs
//! driven by a scripted player can be replayed.

pub mod greedy;

use crate::input::Command;
use crate::skills::SkillId;
use crate::state::{CountryId, PhilosopherId, SpecialEvent};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use greedy::GreedyAI;

/// What a player can see of an active philosopher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisiblePhilosopher {
    pub id: PhilosopherId,
    pub name: String,
    pub country: CountryId,
    pub health: i64,
    pub max_health: i64,
    pub is_invading: bool,
    /// Chance a click lands right now
    pub click_chance: f64,
    pub deadline_turn: u64,
}

/// Player-facing summary of the world.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisibleWorldState {
    pub turn: u64,
    pub wealth: f64,
    pub global_believer_ratio: f64,
    pub infected_countries: usize,
    pub total_countries: usize,
    pub philosophers: Vec<VisiblePhilosopher>,
    pub special_events: Vec<SpecialEvent>,
    pub unlocked: Vec<SkillId>,
}

/// Available commands for the player
pub type AvailableCommands = Vec<Command>;

/// Decision-making trait for scripted players.
pub trait AiPlayer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Choose commands for this turn. May return empty to pass.
    fn decide(
        &mut self,
        visible_state: &VisibleWorldState,
        available_commands: &AvailableCommands,
    ) -> Vec<Command>;
}

/// Picks a random legal command half of the time.
pub struct RandomAi {
    rng: rand::rngs::StdRng,
}

impl RandomAi {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }
}

impl AiPlayer for RandomAi {
    fn name(&self) -> &'static str {
        "RandomAi"
    }

    fn decide(
        &mut self,
        _visible_state: &VisibleWorldState,
        available_commands: &AvailableCommands,
    ) -> Vec<Command> {
        if available_commands.is_empty() {
            return vec![];
        }

        if self.rng.gen::<bool>() {
            if let Some(cmd) = available_commands.choose(&mut self.rng) {
                return vec![cmd.clone()];
            }
        }

        vec![]
    }
}
