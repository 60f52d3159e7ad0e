//! The pipeline's output: one move or one switch, with reasoning and confidence

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::battle::moves::MoveRecord;

/// Reasoning used when nothing better was produced
pub const NO_REASONING: &str = "No reasoning provided";

/// What kind of action is being requested or was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    #[display(fmt = "move")]
    Move,
    #[display(fmt = "switch")]
    Switch,
}

/// Team member chosen to switch in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchTarget {
    pub team_index: usize,
    pub name: String,
}

/// The chosen action. The variant is the decision kind, so a move decision
/// can never carry a switch target or the other way around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Move {
        /// Slot in the active combatant's move list; `None` for the placeholder
        move_index: Option<usize>,
        selected_move: MoveRecord,
    },
    Switch {
        /// `None` means "cannot switch", not an error
        switch_target: Option<SwitchTarget>,
    },
}

/// Immutable decision handed to the turn engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(flatten)]
    action: Action,
    reasoning: String,
    confidence: f32,
}

impl Decision {
    pub fn new(action: Action, reasoning: impl Into<String>, confidence: f32) -> Self {
        let reasoning = reasoning.into();
        let reasoning = if reasoning.trim().is_empty() {
            NO_REASONING.to_string()
        } else {
            reasoning
        };
        Self {
            action,
            reasoning,
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
        }
    }

    pub fn use_move(
        move_index: Option<usize>,
        selected_move: MoveRecord,
        reasoning: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self::new(
            Action::Move {
                move_index,
                selected_move,
            },
            reasoning,
            confidence,
        )
    }

    pub fn switch_to(
        team_index: usize,
        name: impl Into<String>,
        reasoning: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self::new(
            Action::Switch {
                switch_target: Some(SwitchTarget {
                    team_index,
                    name: name.into(),
                }),
            },
            reasoning,
            confidence,
        )
    }

    /// Switch decision with no eligible target
    pub fn cannot_switch(reasoning: impl Into<String>, confidence: f32) -> Self {
        Self::new(
            Action::Switch {
                switch_target: None,
            },
            reasoning,
            confidence,
        )
    }

    pub fn kind(&self) -> DecisionKind {
        match self.action {
            Action::Move { .. } => DecisionKind::Move,
            Action::Switch { .. } => DecisionKind::Switch,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn selected_move(&self) -> Option<&MoveRecord> {
        match &self.action {
            Action::Move { selected_move, .. } => Some(selected_move),
            Action::Switch { .. } => None,
        }
    }

    pub fn move_index(&self) -> Option<usize> {
        match &self.action {
            Action::Move { move_index, .. } => *move_index,
            Action::Switch { .. } => None,
        }
    }

    pub fn switch_target(&self) -> Option<&SwitchTarget> {
        match &self.action {
            Action::Switch { switch_target } => switch_target.as_ref(),
            Action::Move { .. } => None,
        }
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Short description for logs
    pub fn summary(&self) -> String {
        match &self.action {
            Action::Move { selected_move, .. } => format!("use {}", selected_move.name),
            Action::Switch {
                switch_target: Some(target),
            } => format!("switch to {}", target.name),
            Action::Switch {
                switch_target: None,
            } => "no switch available".to_string(),
        }
    }
}
