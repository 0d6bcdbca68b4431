use devpulse_ai::{LLMProvider, LLMProviderFactory};
use devpulse_core::{ActivitySource, InsightStore, PulseConfig, PulseError, Result};
use devpulse_insights::{build_dispatcher, Dispatcher};
use devpulse_store::SqliteStore;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub insights: Arc<dyn InsightStore>,
}

impl AppState {
    pub fn new(
        config: &PulseConfig,
        source: Arc<dyn ActivitySource>,
        insights: Arc<dyn InsightStore>,
        provider: Arc<dyn LLMProvider>,
    ) -> Self {
        Self {
            dispatcher: build_dispatcher(config, source, insights.clone(), provider),
            insights,
        }
    }

    /// SQLite store plus the configured LLM provider.
    pub async fn from_config(config: &PulseConfig) -> Result<Self> {
        let store = Arc::new(
            SqliteStore::connect(&config.database.url, config.database.max_connections).await?,
        );
        let provider = LLMProviderFactory::create_from_config(&config.llm).map_err(PulseError::from)?;
        info!(
            provider = provider.provider_name(),
            model = provider.model_name(),
            "LLM provider ready"
        );

        Ok(Self::new(config, store.clone(), store, provider))
    }
}
