use crate::ai::{AiPlayer, AvailableCommands, VisibleWorldState};
use crate::input::Command;
use crate::skills::{SkillId, SkillTree};

/// A deterministic, priority-based player.
///
/// Always picks the single command with the highest immediate score.
#[derive(Default)]
pub struct GreedyAI;

impl GreedyAI {
    pub fn new() -> Self {
        Self
    }

    /// Scores a command by heuristic value. Non-positive scores are ignored.
    fn score_command(&self, cmd: &Command, state: &VisibleWorldState) -> i32 {
        match cmd {
            // Tier 0: free believers that vanish if left alone
            Command::ClaimSpecialEvent { .. } => 6000,

            // Tier 1: fight philosophers, invaders first
            Command::AttackOpponent { philosopher } => {
                let Some(target) = state.philosophers.iter().find(|p| p.id == *philosopher) else {
                    return -100;
                };
                let base = if target.is_invading { 5000 } else { 3000 };
                base + (target.click_chance * 1000.0) as i32
            }

            // Tier 2: skills, economy before spread before the rest
            Command::UnlockSkill { skill } => {
                let def = skill.def();
                let base = match def.tree {
                    SkillTree::Wealth => 2500,
                    SkillTree::Spread => 2000,
                    SkillTree::Trait => 1500,
                    SkillTree::Virtue => 1000,
                };
                // Drain skills hurt the extraction rate.
                if matches!(skill, SkillId::SCorrupt | SkillId::SDivide | SkillId::SReplace) {
                    return 100;
                }
                base - def.tier as i32 * 50
            }

            // Setup is driven by the caller.
            Command::SelectTrait { .. } | Command::StartGame { .. } => -1,
        }
    }
}

impl AiPlayer for GreedyAI {
    fn name(&self) -> &'static str {
        "GreedyAI"
    }

    fn decide(
        &mut self,
        visible_state: &VisibleWorldState,
        available_commands: &AvailableCommands,
    ) -> Vec<Command> {
        let mut best_cmd = None;
        let mut best_score = 0;

        for cmd in available_commands {
            let score = self.score_command(cmd, visible_state);
            if score > best_score {
                best_score = score;
                best_cmd = Some(cmd.clone());
            }
        }

        best_cmd.into_iter().collect()
    }
}
