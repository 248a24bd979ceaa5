use crate::state::{CountryId, PhilosopherId, SpecialEventId, StartingTrait};
use crate::skills::SkillId;
use serde::{Deserialize, Serialize};

/// Player commands accepted by [`Simulation::execute`](crate::step::Simulation::execute).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    // Setup
    SelectTrait { starting_trait: StartingTrait },
    StartGame { country: CountryId },

    // Progression
    UnlockSkill { skill: SkillId },

    // Interaction
    AttackOpponent { philosopher: PhilosopherId },
    ClaimSpecialEvent { event: SpecialEventId },
}

impl Command {
    /// Whether the command is only valid before the game has started.
    pub fn is_setup(&self) -> bool {
        matches!(self, Command::SelectTrait { .. } | Command::StartGame { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let cmd = Command::UnlockSkill {
            skill: SkillId::Compassion,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"command":"unlock_skill","skill":"compassion"}"#);
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
        assert!(!cmd.is_setup());
        assert!(Command::StartGame { country: "US".into() }.is_setup());
    }
}
