use crate::llm_provider::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Configuration for OpenAI and OpenAI-compatible chat completion endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAICompatibleConfig {
    /// Base URL for the API (e.g., "http://localhost:1234/v1")
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// Transport-level timeout in seconds; callers apply their own tighter deadline
    pub timeout_secs: u64,
    /// Optional API key (some providers require it, some don't)
    pub api_key: Option<String>,
    /// Provider name for display purposes
    pub provider_name: String,
    /// Ask the endpoint for a JSON object response
    pub json_mode: bool,
}

impl Default for OpenAICompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            model: "local-model".to_string(),
            timeout_secs: 60,
            api_key: None,
            provider_name: "openai-compatible".to_string(),
            json_mode: false,
        }
    }
}

impl OpenAICompatibleConfig {
    /// Config for the hosted OpenAI API
    pub fn openai(api_key: String, model: Option<String>) -> Self {
        Self {
            base_url: OPENAI_API_BASE.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            api_key: Some(api_key),
            provider_name: "openai".to_string(),
            json_mode: true,
            ..Default::default()
        }
    }

    /// Config for a custom endpoint
    pub fn custom(base_url: String, model: String, provider_name: String) -> Self {
        Self {
            base_url,
            model,
            provider_name,
            ..Default::default()
        }
    }
}

/// OpenAI-compatible LLM provider
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: Client,
}

impl OpenAICompatibleProvider {
    pub fn new(config: OpenAICompatibleConfig) -> LLMResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let request = ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            temperature: Some(config.temperature),
            max_tokens: config.max_tokens,
            top_p: config.top_p,
            stop: config.stop.clone(),
            response_format: self.config.json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let mut request_builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&request);

        if let Some(api_key) = &self.config.api_key {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| LLMError::Transport {
                provider: self.config.provider_name.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(LLMError::Http {
                provider: self.config.provider_name.clone(),
                status: status.as_u16(),
                body: error_text,
            });
        }

        let chat_response: ChatCompletionsResponse =
            response.json().await.map_err(|e| LLMError::Decode {
                provider: self.config.provider_name.clone(),
                message: e.to_string(),
            })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::EmptyResponse(self.config.provider_name.clone()))?;

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LLMError::EmptyResponse(self.config.provider_name.clone()))?;

        Ok(LLMResponse {
            content,
            total_tokens: chat_response.usage.map(|u| u.total_tokens),
            finish_reason: choice.finish_reason,
            model: chat_response
                .model
                .unwrap_or_else(|| self.config.model.clone()),
        })
    }

    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            rpm_limit: if self.config.provider_name == "openai" {
                Some(500)
            } else {
                None
            },
        }
    }
}

// API request/response types for Chat Completions API

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: usize,
}
