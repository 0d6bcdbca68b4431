use crate::llm_provider::*;
use devpulse_core::LLMConfig;
use std::sync::Arc;

#[cfg(feature = "anthropic")]
use crate::anthropic_provider::{AnthropicConfig, AnthropicProvider};

#[cfg(feature = "openai-compatible")]
use crate::openai_compatible_provider::{OpenAICompatibleConfig, OpenAICompatibleProvider};

/// Factory for creating LLM providers based on configuration
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    pub fn create_from_config(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let provider_name = config.provider.to_lowercase();

        match provider_name.as_str() {
            #[cfg(feature = "openai-compatible")]
            "openai" => Self::create_openai_provider(config),
            #[cfg(feature = "openai-compatible")]
            "openai-compatible" => Self::create_openai_compatible_provider(config),
            #[cfg(feature = "anthropic")]
            "anthropic" => Self::create_anthropic_provider(config),
            _ => Err(LLMError::Config(format!(
                "Unsupported LLM provider: {}. Available providers:{}{}",
                provider_name,
                if cfg!(feature = "openai-compatible") {
                    " openai, openai-compatible"
                } else {
                    ""
                },
                if cfg!(feature = "anthropic") {
                    " anthropic"
                } else {
                    ""
                }
            ))),
        }
    }

    /// Generation parameters derived from configuration
    pub fn generation_config(config: &LLMConfig) -> GenerationConfig {
        GenerationConfig {
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            ..Default::default()
        }
    }

    #[cfg(feature = "openai-compatible")]
    fn create_openai_provider(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let api_key = config
            .openai_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LLMError::Config(
                    "OpenAI API key is required. Set OPENAI_API_KEY environment variable."
                        .to_string(),
                )
            })?;

        let mut provider_config = OpenAICompatibleConfig::openai(api_key, config.model.clone());
        if let Some(base_url) = &config.base_url {
            provider_config.base_url = base_url.clone();
        }

        Ok(Arc::new(OpenAICompatibleProvider::new(provider_config)?))
    }

    #[cfg(feature = "openai-compatible")]
    fn create_openai_compatible_provider(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let base_url = config.base_url.clone().ok_or_else(|| {
            LLMError::Config(
                "base_url is required for the openai-compatible provider".to_string(),
            )
        })?;

        let mut provider_config = OpenAICompatibleConfig::custom(
            base_url,
            config
                .model
                .clone()
                .unwrap_or_else(|| "local-model".to_string()),
            "openai-compatible".to_string(),
        );
        provider_config.api_key = config.openai_api_key.clone();

        Ok(Arc::new(OpenAICompatibleProvider::new(provider_config)?))
    }

    #[cfg(feature = "anthropic")]
    fn create_anthropic_provider(config: &LLMConfig) -> LLMResult<Arc<dyn LLMProvider>> {
        let mut provider_config = AnthropicConfig {
            api_key: config.anthropic_api_key.clone().unwrap_or_default(),
            ..Default::default()
        };
        if let Some(model) = &config.model {
            provider_config.model = model.clone();
        }
        if let Some(base_url) = &config.base_url {
            provider_config.base_url = base_url.clone();
        }

        Ok(Arc::new(AnthropicProvider::new(provider_config)?))
    }
}
