//! Battle decision AI
//!
//! Given a battle snapshot, produce exactly one action for the computer
//! side: use a move or switch in a teammate. A language model is consulted
//! when the difficulty allows it, with a deterministic heuristic behind it
//! so a decision always comes out.

pub mod analysis;
pub mod context;
pub mod decision;
pub mod difficulty;
pub mod heuristic;
pub mod interpreter;
pub mod pipeline;
pub mod prompt;

pub use context::{Annotations, DecisionContext, DecisionPath};
pub use decision::{Action, Decision, DecisionKind, SwitchTarget};
pub use difficulty::{DifficultyLevel, DifficultyProfile, HistoryLimit};
pub use heuristic::HeuristicDecisionMaker;
pub use interpreter::ResponseInterpreter;
pub use pipeline::{DecisionPipeline, Stage};
pub use prompt::{Prompt, PromptBuilder};
