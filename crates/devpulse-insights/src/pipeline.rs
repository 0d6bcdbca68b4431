use crate::aggregator::ActivityAggregator;
use crate::persister::InsightPersister;
use crate::prompts::build_prompt;
use crate::results::RubricResult;
use chrono::Utc;
use devpulse_ai::{ModelClient, JSON_ONLY_INSTRUCTION};
use devpulse_core::{Insight, InsightType, PulseError, Result};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of one successful rubric run.
#[derive(Debug, Clone)]
pub struct RubricRun {
    pub insight: Insight,
    /// True when the result was synthesised without calling the model.
    pub fallback: bool,
}

impl RubricRun {
    pub fn data(&self) -> &Value {
        &self.insight.insight_data
    }
}

/// Aggregate, prompt, complete, summarise, persist. All-or-nothing.
pub struct InsightPipeline {
    aggregator: ActivityAggregator,
    model: ModelClient,
    persister: InsightPersister,
    sample_size: usize,
}

impl InsightPipeline {
    pub fn new(
        aggregator: ActivityAggregator,
        model: ModelClient,
        persister: InsightPersister,
        sample_size: usize,
    ) -> Self {
        Self {
            aggregator,
            model,
            persister,
            sample_size,
        }
    }

    pub fn aggregator(&self) -> &ActivityAggregator {
        &self.aggregator
    }

    pub async fn run(
        &self,
        kind: InsightType,
        integration_id: &str,
        project_id: &str,
    ) -> Result<RubricRun> {
        let started = Instant::now();
        let data = self.aggregator.collect(integration_id, kind, Utc::now()).await?;
        let provenance = data.provenance();

        if kind == InsightType::PipelineHealth && data.workflows.is_empty() {
            info!(integration_id, "No workflows configured, recording NOT_CONFIGURED pipeline health");
            let insight = self
                .persister
                .save(project_id, &RubricResult::pipeline_not_configured(), &provenance)
                .await?;
            return Ok(RubricRun {
                insight,
                fallback: true,
            });
        }

        if data.is_empty() {
            return Err(PulseError::DataUnavailable {
                insight_type: kind,
                integration_id: integration_id.to_string(),
            });
        }

        let prompt = build_prompt(kind, &data, self.sample_size);
        debug!(insight_type = %kind, prompt_chars = prompt.len(), "Requesting model analysis");

        let parsed = self.model.complete(JSON_ONLY_INSTRUCTION, &prompt).await?;
        let result = RubricResult::from_model(kind, &parsed);
        let insight = self.persister.save(project_id, &result, &provenance).await?;

        info!(
            insight_type = %kind,
            integration_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rubric analysis complete"
        );
        Ok(RubricRun {
            insight,
            fallback: false,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedProvider;
    use super::*;
    use crate::aggregator::AggregationLimits;
    use chrono::Duration;
    use devpulse_core::{AlertCategory, Commit, Workflow};
    use devpulse_store::MemoryStore;
    use std::sync::Arc;

    fn pipeline(store: Arc<MemoryStore>, provider: Arc<ScriptedProvider>) -> InsightPipeline {
        InsightPipeline::new(
            ActivityAggregator::new(store.clone(), AggregationLimits::default()),
            ModelClient::new(provider, std::time::Duration::from_secs(25)),
            InsightPersister::new(store, Duration::days(7)),
            15,
        )
    }

    fn seed_commit(store: &MemoryStore) {
        store.add_commit(Commit {
            sha: "abc".into(),
            integration_id: "int-1".into(),
            repository_id: "repo-1".into(),
            author_login: Some("dev".into()),
            message: "Bump openssl".into(),
            additions: 3,
            deletions: 3,
            files_changed: 1,
            committed_at: Utc::now(),
        });
    }

    #[tokio::test]
    async fn security_without_data_is_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::failing());
        let err = pipeline(store.clone(), provider.clone())
            .run(InsightType::Security, "int-1", "proj-1")
            .await
            .unwrap_err();

        assert!(matches!(err, PulseError::DataUnavailable { insight_type: InsightType::Security, .. }));
        assert_eq!(provider.calls(), 0);
        assert!(store.all_insights().is_empty());
    }

    #[tokio::test]
    async fn pipeline_health_without_workflows_skips_the_model() {
        let store = Arc::new(MemoryStore::new());
        seed_commit(&store);
        let provider = Arc::new(ScriptedProvider::failing());

        let run = pipeline(store.clone(), provider.clone())
            .run(InsightType::PipelineHealth, "int-1", "proj-1")
            .await
            .unwrap();

        assert!(run.fallback);
        assert_eq!(run.data()["status"], "NOT_CONFIGURED");
        assert_eq!(run.insight.alert_category, AlertCategory::Pipeline);
        assert_eq!(provider.calls(), 0);
        assert_eq!(store.all_insights().len(), 1);
    }

    #[tokio::test]
    async fn model_reply_is_typed_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        seed_commit(&store);
        let provider = Arc::new(ScriptedProvider::new(vec![Some(
            "```json\n{\"security_score\": 0.55, \"vulnerabilities\": [{\"severity\": \"CRITICAL\", \"title\": \"Weak TLS\"}]}\n```",
        )]));

        let run = pipeline(store.clone(), provider)
            .run(InsightType::Security, "int-1", "proj-1")
            .await
            .unwrap();

        assert!(!run.fallback);
        assert_eq!(run.insight.confidence_score, 0.8);
        assert_eq!(run.insight.alert_category, AlertCategory::Security);
        assert!(run.insight.executive_summary.starts_with("URGENT:"));
        assert_eq!(run.data()["provenance"]["commits_analyzed"], 1);
    }

    #[tokio::test]
    async fn model_failure_aborts_without_writing() {
        let store = Arc::new(MemoryStore::new());
        store.add_workflow(Workflow {
            id: "wf".into(),
            integration_id: "int-1".into(),
            name: "CI".into(),
            path: ".github/workflows/ci.yml".into(),
            state: "active".into(),
        });

        let err = pipeline(store.clone(), Arc::new(ScriptedProvider::failing()))
            .run(InsightType::PipelineHealth, "int-1", "proj-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::ModelHttp { status: 503, .. }));
        assert!(store.all_insights().is_empty());
    }
}
