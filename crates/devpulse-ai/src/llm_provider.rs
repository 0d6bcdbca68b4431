use async_trait::async_trait;
use devpulse_core::PulseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("{provider} API error ({status}): {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Failed to send request to {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("Failed to decode {provider} response: {message}")]
    Decode { provider: String, message: String },

    #[error("{0} returned no content")]
    EmptyResponse(String),

    #[error("Provider configuration error: {0}")]
    Config(String),
}

impl From<LLMError> for PulseError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Http { status, body, .. } => PulseError::ModelHttp { status, body },
            LLMError::Config(msg) => PulseError::Config(msg),
            other => PulseError::ModelTransport(other.to_string()),
        }
    }
}

/// Result type for LLM operations
pub type LLMResult<T> = std::result::Result<T, LLMError>;

/// Rate characteristics of an LLM provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCharacteristics {
    /// Requests per minute limit (for pacing)
    pub rpm_limit: Option<u64>,
}

impl ProviderCharacteristics {
    /// Smallest gap between consecutive requests that stays under `rpm_limit`.
    pub fn min_request_interval(&self) -> Option<Duration> {
        match self.rpm_limit {
            Some(rpm) if rpm > 0 => Some(Duration::from_secs(60) / rpm as u32),
            _ => None,
        }
    }
}

/// Configuration for generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
    /// Top-p nucleus sampling parameter
    pub top_p: Option<f32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: Some(2000),
            top_p: None,
            stop: None,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Response from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text content
    pub content: String,
    /// Total tokens used in the request
    pub total_tokens: Option<usize>,
    /// Finish reason (e.g., "stop", "length")
    pub finish_reason: Option<String>,
    /// Model used for generation
    pub model: String,
}

/// Main trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a chat completion with message history.
    ///
    /// Implementations issue exactly one request. Dropping the returned
    /// future aborts the request.
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse>;

    /// Get the name of this provider
    fn provider_name(&self) -> &str;

    /// Get the model identifier
    fn model_name(&self) -> &str;

    /// Rate characteristics used to pace batch runs. Unlimited by default.
    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_errors_keep_their_status() {
        let err: PulseError = LLMError::Http {
            provider: "openai".into(),
            status: 429,
            body: "rate limited".into(),
        }
        .into();
        match err {
            PulseError::ModelHttp { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn request_interval_follows_rpm_limit() {
        let limited = ProviderCharacteristics { rpm_limit: Some(50) };
        assert_eq!(limited.min_request_interval(), Some(Duration::from_millis(1200)));
        assert_eq!(ProviderCharacteristics::default().min_request_interval(), None);
        assert_eq!(ProviderCharacteristics { rpm_limit: Some(0) }.min_request_interval(), None);
    }

    #[test]
    fn transport_errors_map_to_transport_kind() {
        let err: PulseError = LLMError::EmptyResponse("anthropic".into()).into();
        assert_eq!(err.code(), "MODEL_TRANSPORT_ERROR");
    }
}
