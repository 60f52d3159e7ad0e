//! Prompt templates per difficulty and request kind
//!
//! All templates share one structure: a system instruction, and a user
//! instruction with a single `{context}` placeholder for the battle
//! summary. They differ only in what they ask the model to weigh.

use crate::ai::decision::DecisionKind;
use crate::ai::difficulty::{DifficultyLevel, DifficultyProfile};
use crate::llm::client::ChatMessage;

/// Placeholder replaced by the serialized battle context
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Ready-to-send prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(self.system), ChatMessage::user(self.user)]
    }
}

struct Templates {
    system: &'static str,
    move_user: &'static str,
    switch_user: &'static str,
}

const EASY: Templates = Templates {
    system: "You are playing a Pokemon battle. Pick a good action. Keep your answer short.",
    move_user: r#"{context}
Pick one of your moves. Think about type effectiveness.

Answer exactly like this:
MOVE: <move number>
REASONING: <one sentence>"#,
    switch_user: r#"{context}
Pick a Pokemon from your team to switch in. Think about type effectiveness.

Answer exactly like this:
SWITCH: <Pokemon name>
REASONING: <one sentence>"#,
};

const MEDIUM: Templates = Templates {
    system: r#"You are a competent Pokemon battle strategist controlling one side of a turn-based battle.
You choose exactly one action per turn and always answer in the requested format."#,
    move_user: r#"{context}
Choose the best move for this turn. Consider:
- Type effectiveness of each move against the opponent's types
- Move power and accuracy
- Same-type attack bonus

Answer exactly like this:
MOVE: <move number from the list>
REASONING: <one or two sentences>"#,
    switch_user: r#"{context}
Choose the best Pokemon to switch in. Consider:
- Which team member resists the opponent's types
- Which team member threatens the opponent with its own moves
- Remaining HP of each candidate

Answer exactly like this:
SWITCH: <Pokemon name from your team>
REASONING: <one or two sentences>"#,
};

const HARD: Templates = Templates {
    system: r#"You are an expert competitive Pokemon battler controlling one side of a turn-based battle.
Play to win over several turns, not just this one. You choose exactly one action per turn and always answer in the requested format."#,
    move_user: r#"{context}
Choose the best move for this turn. Consider:
- Type effectiveness of each move against the opponent's types
- Move power and accuracy
- Same-type attack bonus
- Both sides' HP percentages and whether the opponent can be knocked out now
- Move priority and which side moves first
- How this turn sets up the next few turns, including whether switching would be better

Answer exactly like this:
MOVE: <move number from the list>
REASONING: <two or three sentences>"#,
    switch_user: r#"{context}
Choose the best Pokemon to switch in. Consider:
- Which team member resists the opponent's types and likely moves
- Which team member threatens the opponent with its own moves
- Remaining HP of each candidate and who you need to preserve for later
- Speed relative to the opponent
- How the switch shapes the next few turns

Answer exactly like this:
SWITCH: <Pokemon name from your team>
REASONING: <two or three sentences>"#,
};

/// Stateless prompt assembly
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build from a difficulty name; `None` and unknown names use medium
    pub fn build(difficulty: Option<&str>, kind: DecisionKind, context: &str) -> Prompt {
        Self::build_for_level(DifficultyLevel::from_name(difficulty), kind, context)
    }

    pub fn build_for_level(level: DifficultyLevel, kind: DecisionKind, context: &str) -> Prompt {
        let templates = match level {
            DifficultyLevel::Easy => &EASY,
            DifficultyLevel::Medium => &MEDIUM,
            DifficultyLevel::Hard => &HARD,
        };
        Self::fill(templates, kind, context)
    }

    /// Build from a profile; profiles asking for simple prompts get the
    /// terse templates whatever their level
    pub fn build_for_profile(
        profile: &DifficultyProfile,
        kind: DecisionKind,
        context: &str,
    ) -> Prompt {
        if profile.uses_simple_prompts() {
            Self::fill(&EASY, kind, context)
        } else {
            Self::build_for_level(profile.level(), kind, context)
        }
    }

    fn fill(templates: &Templates, kind: DecisionKind, context: &str) -> Prompt {
        let user = match kind {
            DecisionKind::Move => templates.move_user,
            DecisionKind::Switch => templates.switch_user,
        };
        Prompt {
            system: templates.system.to_string(),
            user: user.replacen(CONTEXT_PLACEHOLDER, context, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::Role;

    #[test]
    fn test_context_substituted_once() {
        let prompt = PromptBuilder::build(Some("hard"), DecisionKind::Move, "Battle turn: 3");
        assert!(prompt.user.starts_with("Battle turn: 3\n"));
        assert!(!prompt.user.contains(CONTEXT_PLACEHOLDER));
        assert!(prompt.user.contains("MOVE: <move number"));
    }

    #[test]
    fn test_unknown_difficulty_uses_medium() {
        let unknown = PromptBuilder::build(Some("nightmare"), DecisionKind::Move, "ctx");
        let none = PromptBuilder::build(None, DecisionKind::Move, "ctx");
        let medium = PromptBuilder::build_for_level(DifficultyLevel::Medium, DecisionKind::Move, "ctx");
        assert_eq!(unknown, medium);
        assert_eq!(none, medium);
    }

    #[test]
    fn test_templates_differ_in_considerations() {
        let easy = PromptBuilder::build(Some("easy"), DecisionKind::Move, "ctx");
        let medium = PromptBuilder::build(Some("medium"), DecisionKind::Move, "ctx");
        let hard = PromptBuilder::build(Some("hard"), DecisionKind::Move, "ctx");

        assert!(easy.user.contains("type effectiveness"));
        assert!(!easy.user.contains("accuracy"));
        assert!(medium.user.contains("accuracy"));
        assert!(!medium.user.contains("priority"));
        assert!(hard.user.contains("priority"));
        assert!(hard.user.contains("next few turns"));
    }

    #[test]
    fn test_switch_template() {
        let prompt = PromptBuilder::build(Some("medium"), DecisionKind::Switch, "ctx");
        assert!(prompt.user.contains("SWITCH: <Pokemon name"));
        assert!(!prompt.user.contains("MOVE:"));
    }

    #[test]
    fn test_profile_with_simple_prompts() {
        let from_profile =
            PromptBuilder::build_for_profile(&DifficultyProfile::easy(), DecisionKind::Move, "ctx");
        let easy = PromptBuilder::build_for_level(DifficultyLevel::Easy, DecisionKind::Move, "ctx");
        assert_eq!(from_profile, easy);
    }

    #[test]
    fn test_into_messages() {
        let messages = PromptBuilder::build(None, DecisionKind::Move, "ctx").into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
    }
}
