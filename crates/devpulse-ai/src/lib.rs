pub mod json_repair;
pub mod llm_factory;
pub mod llm_provider;
pub mod model_client;

// Cloud LLM providers
#[cfg(feature = "anthropic")]
pub mod anthropic_provider;
#[cfg(feature = "openai-compatible")]
pub mod openai_compatible_provider;

pub use json_repair::{parse_model_json, strip_code_fence};
pub use llm_factory::LLMProviderFactory;
pub use llm_provider::*;
pub use model_client::{ModelClient, JSON_ONLY_INSTRUCTION};
