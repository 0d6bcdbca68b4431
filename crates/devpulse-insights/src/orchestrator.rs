use crate::pipeline::InsightPipeline;
use devpulse_core::{InsightType, PulseError, Result, RubricFailure};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of a "generate all" run with at least one success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub success: bool,
    pub generated: usize,
    pub failed: usize,
}

/// Runs every rubric once, strictly one after another, pausing between attempts.
#[derive(Clone)]
pub struct Orchestrator {
    pipeline: Arc<InsightPipeline>,
    delay: Duration,
}

impl Orchestrator {
    pub fn new(pipeline: Arc<InsightPipeline>, delay: Duration) -> Self {
        Self { pipeline, delay }
    }

    /// Pause between consecutive rubric attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Individual rubric failures are logged and counted. Fails only when
    /// every rubric failed.
    pub async fn run_all(&self, integration_id: &str, project_id: &str) -> Result<BatchSummary> {
        let started = Instant::now();
        let mut generated = 0;
        let mut failures = Vec::new();

        for (index, kind) in InsightType::ALL.into_iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.pipeline.run(kind, integration_id, project_id).await {
                Ok(_) => generated += 1,
                Err(e) => {
                    warn!(
                        insight_type = %kind,
                        integration_id,
                        code = e.code(),
                        error = %e,
                        "Rubric failed, continuing batch"
                    );
                    failures.push(RubricFailure {
                        insight_type: kind,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let attempted = InsightType::ALL.len();
        info!(
            integration_id,
            generated,
            failed = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch insight generation finished"
        );

        if generated == 0 {
            return Err(PulseError::BatchFailed {
                attempted,
                failures,
            });
        }

        Ok(BatchSummary {
            success: true,
            generated,
            failed: failures.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{ActivityAggregator, AggregationLimits};
    use crate::persister::InsightPersister;
    use crate::pipeline::test_support::ScriptedProvider;
    use chrono::Utc;
    use devpulse_ai::ModelClient;
    use devpulse_core::{Commit, Contributor, Release, Repository, Workflow, WorkflowRun};
    use devpulse_store::MemoryStore;

    const OK_REPLY: &str = r#"{"confidence": 0.9, "recommendations": ["keep going"]}"#;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.add_repository(Repository {
            id: "repo-1".into(),
            integration_id: "int-1".into(),
            name: "api".into(),
            full_name: "acme/api".into(),
            language: Some("Rust".into()),
            default_branch: Some("main".into()),
            is_private: true,
            open_issues_count: 4,
            updated_at: now,
        });
        store.add_commit(Commit {
            sha: "c1".into(),
            integration_id: "int-1".into(),
            repository_id: "repo-1".into(),
            author_login: Some("dev".into()),
            message: "Add endpoint".into(),
            additions: 40,
            deletions: 2,
            files_changed: 3,
            committed_at: now,
        });
        store.add_contributor(Contributor {
            login: "dev".into(),
            integration_id: "int-1".into(),
            contributions: 12,
        });
        store.add_workflow(Workflow {
            id: "wf-1".into(),
            integration_id: "int-1".into(),
            name: "CI".into(),
            path: ".github/workflows/ci.yml".into(),
            state: "active".into(),
        });
        store.add_workflow_run(WorkflowRun {
            id: "run-1".into(),
            integration_id: "int-1".into(),
            workflow_id: "wf-1".into(),
            status: "completed".into(),
            conclusion: Some("success".into()),
            head_branch: Some("main".into()),
            duration_seconds: Some(240),
            started_at: now,
        });
        store.add_release(Release {
            id: "rel-1".into(),
            integration_id: "int-1".into(),
            tag_name: "v1.0.0".into(),
            name: None,
            draft: false,
            prerelease: false,
            published_at: Some(now),
        });
        store
    }

    fn orchestrator(store: Arc<MemoryStore>, provider: Arc<ScriptedProvider>) -> Orchestrator {
        let pipeline = InsightPipeline::new(
            ActivityAggregator::new(store.clone(), AggregationLimits::default()),
            ModelClient::new(provider, Duration::from_secs(25)),
            InsightPersister::new(store, chrono::Duration::days(7)),
            15,
        );
        Orchestrator::new(Arc::new(pipeline), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failures_are_counted() {
        for k in 1..=7usize {
            let store = seeded_store();
            let replies = (0..7).map(|i| (i < k).then_some(OK_REPLY)).collect();
            let provider = Arc::new(ScriptedProvider::new(replies));

            let summary = orchestrator(store.clone(), provider)
                .run_all("int-1", "proj-1")
                .await
                .unwrap();

            assert_eq!(
                summary,
                BatchSummary {
                    success: true,
                    generated: k,
                    failed: 7 - k
                }
            );
            assert_eq!(store.all_insights().len(), k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_raise_an_aggregate_error() {
        let provider = Arc::new(ScriptedProvider::failing());
        let err = orchestrator(seeded_store(), provider.clone())
            .run_all("int-1", "proj-1")
            .await
            .unwrap_err();

        match err {
            PulseError::BatchFailed { attempted, failures } => {
                assert_eq!(attempted, 7);
                assert_eq!(failures.len(), 7);
                assert!(failures.iter().all(|f| f.code == "MODEL_HTTP_ERROR"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(provider.calls(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn rubrics_are_paced_sequentially() {
        let provider = Arc::new(ScriptedProvider::new(vec![Some(OK_REPLY); 7]));
        let started = tokio::time::Instant::now();

        orchestrator(seeded_store(), provider)
            .run_all("int-1", "proj-1")
            .await
            .unwrap();

        // Six gaps between seven attempts.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_integration_still_records_pipeline_fallback() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::failing());

        let summary = orchestrator(store.clone(), provider.clone())
            .run_all("int-1", "proj-1")
            .await
            .unwrap();

        assert_eq!(summary.generated, 1);
        assert_eq!(summary.failed, 6);
        assert_eq!(provider.calls(), 0);
    }
}
