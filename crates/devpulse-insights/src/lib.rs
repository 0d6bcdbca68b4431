pub mod aggregator;
pub mod dispatch;
pub mod orchestrator;
pub mod persister;
pub mod pipeline;
pub mod prompts;
pub mod results;
pub mod rubric;
pub mod summary;

pub use aggregator::{ActivityAggregator, AggregatedData, AggregationLimits};
pub use dispatch::{
    race_deadline, Action, DispatchOutcome, DispatchState, Dispatcher, InsightRequest,
    RoutedRequest,
};
pub use orchestrator::{BatchSummary, Orchestrator};
pub use persister::InsightPersister;
pub use pipeline::{InsightPipeline, RubricRun};
pub use prompts::build_prompt;
pub use results::{Finding, PipelineStatus, RubricDetails, RubricResult, SCHEMA_VERSION};
pub use rubric::{rubric, RubricSpec, SourceSlice};
pub use summary::executive_summary;

use devpulse_ai::{LLMProvider, LLMProviderFactory, ModelClient};
use devpulse_core::{ActivitySource, InsightStore, PulseConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Batch pacing: the configured delay, raised to the provider's minimum
/// request interval when that is longer.
pub fn batch_pacing(configured: Duration, provider: &dyn LLMProvider) -> Duration {
    match provider.characteristics().min_request_interval() {
        Some(interval) if interval > configured => {
            info!(
                provider = provider.provider_name(),
                configured_ms = configured.as_millis() as u64,
                pacing_ms = interval.as_millis() as u64,
                "Raising batch pacing to respect provider rate limit"
            );
            interval
        }
        _ => configured,
    }
}

/// Wire the pipeline, orchestrator and dispatcher from configuration.
pub fn build_dispatcher(
    config: &PulseConfig,
    source: Arc<dyn ActivitySource>,
    store: Arc<dyn InsightStore>,
    provider: Arc<dyn LLMProvider>,
) -> Dispatcher {
    let pipeline_cfg = &config.pipeline;
    let pacing = batch_pacing(pipeline_cfg.batch_delay(), provider.as_ref());

    let model = ModelClient::new(provider, pipeline_cfg.model_timeout())
        .with_generation_config(LLMProviderFactory::generation_config(&config.llm));
    let pipeline = Arc::new(InsightPipeline::new(
        ActivityAggregator::new(source.clone(), AggregationLimits::from(pipeline_cfg)),
        model,
        InsightPersister::new(store, pipeline_cfg.insight_ttl()),
        pipeline_cfg.prompt_sample_size,
    ));
    let orchestrator = Orchestrator::new(pipeline.clone(), pacing);

    Dispatcher::new(
        pipeline,
        orchestrator,
        source,
        pipeline_cfg.single_timeout(),
        pipeline_cfg.batch_timeout(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::ScriptedProvider;
    use devpulse_store::MemoryStore;

    fn dispatcher_for(provider: ScriptedProvider, batch_delay_ms: u64) -> Dispatcher {
        let mut config = PulseConfig::default();
        config.pipeline.batch_delay_ms = batch_delay_ms;
        let store = Arc::new(MemoryStore::new());
        build_dispatcher(&config, store.clone(), store, Arc::new(provider))
    }

    #[test]
    fn rate_limited_provider_stretches_batch_pacing() {
        let mut provider = ScriptedProvider::failing();
        provider.rpm_limit = Some(20);
        let d = dispatcher_for(provider, 1000);
        assert_eq!(d.orchestrator().delay(), Duration::from_secs(3));
    }

    #[test]
    fn configured_delay_wins_when_it_is_longer() {
        let mut provider = ScriptedProvider::failing();
        provider.rpm_limit = Some(500);
        assert_eq!(
            dispatcher_for(provider, 1000).orchestrator().delay(),
            Duration::from_secs(1)
        );
        assert_eq!(
            dispatcher_for(ScriptedProvider::failing(), 0).orchestrator().delay(),
            Duration::ZERO
        );
    }
}
