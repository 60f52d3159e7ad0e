//! Runtime configuration with documented defaults
//!
//! Loaded from TOML; every field is optional in the file and falls back to
//! the defaults below. A few LLM settings can be overridden from the
//! environment so deployments don't need to edit the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::error::{BattleAiError, Result};

/// Settings for the chat-completion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Endpoint URL. Anthropic URLs use the messages format, everything
    /// else is treated as OpenAI-compatible.
    pub api_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Upper bound on generated tokens
    ///
    /// Decisions are a couple of short lines, so this stays small.
    pub max_tokens: u32,

    /// Hard bound on a single model call (seconds)
    ///
    /// On expiry the decision falls back to the heuristic immediately.
    pub timeout_secs: u64,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".into(),
            model: "claude-3-haiku-20240307".into(),
            max_tokens: 512,
            timeout_secs: 10,
            api_key_env: "LLM_API_KEY".into(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the decision pipeline itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Difficulty name; unknown names resolve to medium
    pub difficulty: String,

    /// Seed for the pipeline's random source. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            difficulty: "medium".into(),
            seed: None,
        }
    }
}

/// Complete configuration file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

impl AiConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AiConfig =
            toml::from_str(content).map_err(|e| BattleAiError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LLM_API_URL`, `LLM_MODEL` and `LLM_TIMEOUT_SECS` if set
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = var("LLM_API_URL") {
            self.llm.api_url = url;
        }
        if let Some(model) = var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(timeout) = var("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = timeout.trim().parse().map_err(|_| {
                BattleAiError::Config(format!("LLM_TIMEOUT_SECS is not a number: {}", timeout))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(BattleAiError::Config(
                "llm.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(BattleAiError::Config(
                "llm.max_tokens must be greater than zero".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(BattleAiError::Config("llm.model must not be empty".into()));
        }
        Ok(())
    }
}
