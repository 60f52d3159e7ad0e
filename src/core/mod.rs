pub mod config;
pub mod error;
pub mod types;

pub use config::{AiConfig, LlmConfig, PipelineConfig};
pub use error::{BattleAiError, Result};
pub use types::{PokemonType, RequestId};
