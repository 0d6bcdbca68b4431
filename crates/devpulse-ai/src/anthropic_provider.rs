use crate::llm_provider::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
const API_VERSION: &str = "2023-06-01";

/// Configuration for Anthropic Claude provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key for Anthropic
    pub api_key: String,
    /// Model to use (e.g., "claude-3-5-haiku-20241022")
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Transport-level timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: ANTHROPIC_API_BASE.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Anthropic Claude LLM provider
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> LLMResult<Self> {
        if config.api_key.is_empty() {
            return Err(LLMError::Config(
                "Anthropic API key is required. Set ANTHROPIC_API_KEY environment variable."
                    .to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .filter(|m| !matches!(m.role, MessageRole::System))
                .map(|m| AnthropicMessage {
                    role: match m.role {
                        MessageRole::Assistant => "assistant".to_string(),
                        _ => "user".to_string(),
                    },
                    content: m.content.clone(),
                })
                .collect(),
            system: messages
                .iter()
                .find(|m| matches!(m.role, MessageRole::System))
                .map(|m| m.content.clone()),
            max_tokens: config.max_tokens.unwrap_or(2000),
            temperature: Some(config.temperature),
            top_p: config.top_p,
            stop_sequences: config.stop.clone(),
        };

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::Transport {
                provider: "anthropic".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(LLMError::Http {
                provider: "anthropic".to_string(),
                status: status.as_u16(),
                body: error_text,
            });
        }

        let response: AnthropicResponse = response.json().await.map_err(|e| LLMError::Decode {
            provider: "anthropic".to_string(),
            message: e.to_string(),
        })?;

        let content = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(LLMError::EmptyResponse("anthropic".to_string()));
        }

        Ok(LLMResponse {
            content,
            total_tokens: Some(response.usage.input_tokens + response.usage.output_tokens),
            finish_reason: response.stop_reason,
            model: response.model,
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            rpm_limit: Some(50),
        }
    }
}

// Anthropic API request/response types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: usize,
    output_tokens: usize,
}
