//! Difficulty presets
//!
//! A profile is an immutable bundle of knobs read by every stage: prompt
//! sophistication, how often to skip the model on purpose, how much turn
//! history to show, and which analyses to run. Unknown difficulty names
//! resolve to medium everywhere in the crate.

use derive_more::Display;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::snapshot::TurnRecord;

/// Named difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    #[display(fmt = "easy")]
    Easy,
    #[display(fmt = "medium")]
    Medium,
    #[display(fmt = "hard")]
    Hard,
}

impl Default for DifficultyLevel {
    fn default() -> Self {
        Self::Medium
    }
}

impl DifficultyLevel {
    /// Case-insensitive lookup; `None` and unrecognized names give `Medium`
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_lowercase()).as_deref() {
            Some("easy") => Self::Easy,
            Some("hard") => Self::Hard,
            _ => Self::Medium,
        }
    }
}

/// How many past turns the prompt may show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryLimit {
    Turns(usize),
    Unbounded,
}

impl HistoryLimit {
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Turns(0))
    }
}

/// Immutable difficulty parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    level: DifficultyLevel,
    simple_prompts: bool,
    fallback_probability: f64,
    turn_history_limit: HistoryLimit,
    type_effectiveness: bool,
    power_analysis: bool,
    strategic_reasoning: bool,
}

impl DifficultyProfile {
    /// Terse prompts, skips the model 30% of the time, no history
    pub fn easy() -> Self {
        Self {
            level: DifficultyLevel::Easy,
            simple_prompts: true,
            fallback_probability: 0.30,
            turn_history_limit: HistoryLimit::Turns(0),
            type_effectiveness: true,
            power_analysis: false,
            strategic_reasoning: false,
        }
    }

    pub fn medium() -> Self {
        Self {
            level: DifficultyLevel::Medium,
            simple_prompts: false,
            fallback_probability: 0.10,
            turn_history_limit: HistoryLimit::Turns(3),
            type_effectiveness: true,
            power_analysis: true,
            strategic_reasoning: false,
        }
    }

    /// Never skips the model on purpose; only errors trigger the fallback
    pub fn hard() -> Self {
        Self {
            level: DifficultyLevel::Hard,
            simple_prompts: false,
            fallback_probability: 0.0,
            turn_history_limit: HistoryLimit::Unbounded,
            type_effectiveness: true,
            power_analysis: true,
            strategic_reasoning: true,
        }
    }

    pub fn for_difficulty(level: DifficultyLevel) -> Self {
        match level {
            DifficultyLevel::Easy => Self::easy(),
            DifficultyLevel::Medium => Self::medium(),
            DifficultyLevel::Hard => Self::hard(),
        }
    }

    /// Resolve a profile by name, defaulting to medium
    pub fn for_level(name: Option<&str>) -> Self {
        Self::for_difficulty(DifficultyLevel::from_name(name))
    }

    pub fn level(&self) -> DifficultyLevel {
        self.level
    }

    pub fn uses_simple_prompts(&self) -> bool {
        self.simple_prompts
    }

    pub fn fallback_probability(&self) -> f64 {
        self.fallback_probability
    }

    pub fn turn_history_limit(&self) -> HistoryLimit {
        self.turn_history_limit
    }

    pub fn considers_type_effectiveness(&self) -> bool {
        self.type_effectiveness
    }

    pub fn analyzes_power(&self) -> bool {
        self.power_analysis
    }

    pub fn plans_strategically(&self) -> bool {
        self.strategic_reasoning
    }

    /// Draw once to decide whether this request skips the model
    pub fn should_use_fallback<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.fallback_probability
    }

    /// The most recent turns allowed by the history limit, oldest first
    pub fn history_window<'h>(&self, history: &'h [TurnRecord]) -> &'h [TurnRecord] {
        match self.turn_history_limit {
            HistoryLimit::Unbounded => history,
            HistoryLimit::Turns(n) => &history[history.len().saturating_sub(n)..],
        }
    }
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Self::medium()
    }
}
