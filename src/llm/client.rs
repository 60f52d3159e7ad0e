//! Chat-completion client used by the ConsultModel stage
//!
//! The pipeline only sees the `ChatClient` trait: role-tagged messages in,
//! response text plus usage out. `LlmClient` is the HTTP implementation and
//! supports both Anthropic and OpenAI-compatible APIs (DeepSeek, etc).
//! Calls are synchronous from the caller's point of view and always bounded
//! by the configured timeout.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

use crate::core::config::LlmConfig;

/// Failure modes of a chat-completion call
#[derive(Error, Debug)]
pub enum LlmError {
    /// Missing API key, or the endpoint rejected our credentials
    #[error("LLM not configured or unauthorized: {0}")]
    Auth(String),

    /// Transport failure or non-success status
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// The body arrived but did not have the expected shape
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to start LLM runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// Called on a thread driving a current-thread runtime, which can't block
    #[error("LLM client called from inside a single-threaded async runtime")]
    NestedRuntime,
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// What came back from the model
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub text: String,
    /// Model that actually served the request
    pub model: String,
    pub tokens_used: u32,
}

/// Chat-completion collaborator
pub trait ChatClient: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError>;
}

/// API format type
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

/// HTTP chat client with its own single-threaded runtime
///
/// Inside a multi-thread runtime the call runs under `block_in_place`.
/// Inside a current-thread runtime it returns `LlmError::NestedRuntime`.
pub struct LlmClient {
    client: Client,
    /// Always `Some` until drop
    runtime: Option<Runtime>,
    api_key: String,
    api_url: String,
    api_format: ApiFormat,
    timeout: Duration,
}

impl LlmClient {
    /// Create a new LLM client with explicit configuration
    pub fn new(api_key: String, api_url: String, timeout: Duration) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Auth("API key is empty".into()));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let api_format = Self::detect_api_format(&api_url);

        Ok(Self {
            client,
            runtime: Some(runtime),
            api_key,
            api_url,
            api_format,
            timeout,
        })
    }

    /// Create a client from config, reading the key from `api_key_env`
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| LlmError::Auth(format!("{} not set", config.api_key_env)))?;
        Self::new(api_key, config.api_url.clone(), config.timeout())
    }

    /// Detect API format from URL
    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }

    pub fn api_format(&self) -> &ApiFormat {
        &self.api_format
    }

    async fn complete_anthropic(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError> {
        let system = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let body = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system,
            messages: request
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(WireMessage::from)
                .collect(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
        let response = check_status(response).await?;

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let text = completion
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| LlmError::MalformedResponse("Empty response".into()))?;
        let tokens_used = completion
            .usage
            .map(|u| u.input_tokens + u.output_tokens)
            .unwrap_or(0);

        Ok(ChatCompletion {
            text,
            model: completion.model.unwrap_or_else(|| request.model.clone()),
            tokens_used,
        })
    }

    async fn complete_openai(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError> {
        let body = OpenAIRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            messages: request.messages.iter().map(WireMessage::from).collect(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
        let response = check_status(response).await?;

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let text = completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::MalformedResponse("Empty response".into()))?;

        Ok(ChatCompletion {
            text,
            model: completion.model.unwrap_or_else(|| request.model.clone()),
            tokens_used: completion.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

impl ChatClient for LlmClient {
    fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError> {
        let runtime = self.runtime.as_ref().ok_or(LlmError::NestedRuntime)?;
        let call = async {
            let call = async {
                match self.api_format {
                    ApiFormat::Anthropic => self.complete_anthropic(request).await,
                    ApiFormat::OpenAI => self.complete_openai(request).await,
                }
            };
            tokio::time::timeout(self.timeout, call)
                .await
                .map_err(|_| LlmError::Timeout(self.timeout))?
        };

        match Handle::try_current() {
            Err(_) => runtime.block_on(call),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| runtime.block_on(call))
            }
            Ok(_) => {
                tracing::warn!("LLM client called from a current-thread runtime, skipping request");
                Err(LlmError::NestedRuntime)
            }
        }
    }
}

impl Drop for LlmClient {
    // A plain drop panics when the owner lives inside another runtime
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Map auth failures and other non-success statuses to distinct errors
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        Err(LlmError::Auth(format!("{}: {}", status, error_text)))
    } else {
        Err(LlmError::RequestFailed(format!(
            "API error {}: {}",
            status, error_text
        )))
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// OpenAI-compatible API format (DeepSeek, OpenAI, etc.)
#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    total_tokens: u32,
}

// Shared
#[derive(Serialize)]
struct WireMessage {
    role: Role,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(
            "test-key".into(),
            "https://api.example.com".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_url, "https://api.example.com");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(*client.api_format(), ApiFormat::OpenAI);
    }

    #[test]
    fn test_detect_anthropic_format() {
        assert_eq!(
            LlmClient::detect_api_format("https://api.anthropic.com/v1/messages"),
            ApiFormat::Anthropic
        );
        assert_eq!(
            LlmClient::detect_api_format("https://api.deepseek.com/chat/completions"),
            ApiFormat::OpenAI
        );
    }

    #[test]
    fn test_empty_key_is_auth_error() {
        let result = LlmClient::new(
            "  ".into(),
            "https://api.example.com".into(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(LlmError::Auth(_))));
    }

    #[test]
    fn test_from_config_missing_key() {
        let config = LlmConfig {
            api_key_env: "BATTLE_AI_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        let result = LlmClient::from_config(&config);
        assert!(matches!(result, Err(LlmError::Auth(_))));
    }

    #[test]
    fn test_unreachable_endpoint_fails_without_panicking() {
        let client = LlmClient::new(
            "test-key".into(),
            "http://127.0.0.1:9/v1/chat/completions".into(),
            Duration::from_secs(2),
        )
        .unwrap();
        let request = ChatRequest {
            model: "test-model".into(),
            messages: vec![ChatMessage::user("hello")],
            max_tokens: 16,
        };
        let result = client.complete(&request);
        assert!(matches!(
            result,
            Err(LlmError::RequestFailed(_)) | Err(LlmError::Timeout(_))
        ));
    }

    fn unreachable_client() -> (LlmClient, ChatRequest) {
        let client = LlmClient::new(
            "test-key".into(),
            "http://127.0.0.1:9/v1/chat/completions".into(),
            Duration::from_secs(2),
        )
        .unwrap();
        let request = ChatRequest {
            model: "test-model".into(),
            messages: vec![ChatMessage::user("hello")],
            max_tokens: 16,
        };
        (client, request)
    }

    #[tokio::test]
    async fn test_complete_inside_current_thread_runtime_is_an_error() {
        let (client, request) = unreachable_client();
        let result = client.complete(&request);
        assert!(matches!(result, Err(LlmError::NestedRuntime)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_complete_inside_multi_thread_runtime_blocks_in_place() {
        let (client, request) = unreachable_client();
        let result = client.complete(&request);
        assert!(matches!(
            result,
            Err(LlmError::RequestFailed(_)) | Err(LlmError::Timeout(_))
        ));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::System).unwrap();
        assert_eq!(json, "\"system\"");
    }

    #[test]
    fn test_openai_response_parsing() {
        let json = r#"{
            "model": "deepseek-chat",
            "choices": [{"message": {"role": "assistant", "content": "MOVE: 1"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        }"#;
        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("MOVE: 1"));
        assert_eq!(response.usage.unwrap().total_tokens, 13);
    }

    #[test]
    fn test_anthropic_response_parsing() {
        let json = r#"{
            "content": [{"type": "text", "text": "SWITCH: Blastoise"}],
            "usage": {"input_tokens": 40, "output_tokens": 6}
        }"#;
        let response: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.content[0].text, "SWITCH: Blastoise");
        assert!(response.model.is_none());
        let usage = response.usage.unwrap();
        assert_eq!(usage.input_tokens + usage.output_tokens, 46);
    }
}
