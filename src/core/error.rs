use thiserror::Error;

use crate::llm::client::LlmError;

#[derive(Error, Debug)]
pub enum BattleAiError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The terminal stage found no decision at all. Validate guarantees one,
    /// so seeing this means the fallback contract was broken.
    #[error("Pipeline produced no decision for request {0}")]
    NoDecision(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Data load error: {0}")]
    DataLoad(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BattleAiError>;
