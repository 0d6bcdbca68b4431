//! Request routing and the first-to-settle deadline race.
//!
//! The race abandons the work when the deadline wins: the task keeps running
//! on the runtime and may still persist an insight after the caller has been
//! told the request timed out.

use crate::orchestrator::{BatchSummary, Orchestrator};
use crate::pipeline::InsightPipeline;
use devpulse_core::{ActivitySource, InsightType, PulseError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Lifecycle of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Routing,
    Executing,
    Succeeded,
    Failed,
    TimedOut,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Idle => "idle",
            DispatchState::Routing => "routing",
            DispatchState::Executing => "executing",
            DispatchState::Succeeded => "succeeded",
            DispatchState::Failed => "failed",
            DispatchState::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Requested work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Single(InsightType),
    GenerateAll,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Single(InsightType::Security) => "security_analysis",
            Action::Single(InsightType::CodeQuality) => "code_quality_assessment",
            Action::Single(InsightType::TestCoverage) => "test_coverage_analysis",
            Action::Single(InsightType::Performance) => "performance_insights",
            Action::Single(InsightType::PipelineHealth) => "pipeline_health",
            Action::Single(InsightType::DevPerformance) => "dev_performance",
            Action::Single(InsightType::ReleasePrediction) => "release_prediction",
            Action::GenerateAll => "generate_github_insights",
        }
    }
}

impl FromStr for Action {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        if s == Action::GenerateAll.as_str() {
            return Ok(Action::GenerateAll);
        }
        InsightType::ALL
            .into_iter()
            .map(Action::Single)
            .find(|a| a.as_str() == s)
            .ok_or_else(|| PulseError::InvalidRequest(format!("Unknown action: {}", s)))
    }
}

/// Body of an insight request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub integration_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl InsightRequest {
    /// Validate the action and ids without touching any store.
    pub fn route(&self) -> Result<RoutedRequest> {
        let action: Action = self.action.trim().parse()?;

        let integration_id = non_blank(self.integration_id.as_deref())
            .ok_or_else(|| PulseError::InvalidRequest("integration_id is required".into()))?
            .to_string();

        Ok(RoutedRequest {
            action,
            integration_id,
            project_id: non_blank(self.project_id.as_deref()).map(str::to_string),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// A validated request. A missing project is resolved inside the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedRequest {
    pub action: Action,
    pub integration_id: String,
    pub project_id: Option<String>,
}

async fn resolve_project(
    source: &dyn ActivitySource,
    integration_id: &str,
    project_id: Option<String>,
) -> Result<String> {
    if let Some(id) = project_id {
        return Ok(id);
    }
    source
        .integration_project(integration_id)
        .await?
        .ok_or_else(|| {
            PulseError::InvalidRequest(format!(
                "No project found for integration {}",
                integration_id
            ))
        })
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Stored `insight_data` of the single rubric.
    Single(Value),
    Batch(BatchSummary),
}

/// Race `work` against `deadline`. The work runs as its own task and is
/// detached, not aborted, if the deadline fires first.
pub async fn race_deadline<T, F>(deadline: Duration, work: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let started = Instant::now();
    let handle = tokio::spawn(work);

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(PulseError::Internal(format!(
            "insight task failed: {}",
            join_error
        ))),
        Err(_) => Err(PulseError::DispatchTimeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
    }
}

/// Routes requests to the single-rubric pipeline or the batch orchestrator
/// under the matching deadline.
#[derive(Clone)]
pub struct Dispatcher {
    pipeline: Arc<InsightPipeline>,
    orchestrator: Orchestrator,
    source: Arc<dyn ActivitySource>,
    single_deadline: Duration,
    batch_deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        pipeline: Arc<InsightPipeline>,
        orchestrator: Orchestrator,
        source: Arc<dyn ActivitySource>,
        single_deadline: Duration,
        batch_deadline: Duration,
    ) -> Self {
        Self {
            pipeline,
            orchestrator,
            source,
            single_deadline,
            batch_deadline,
        }
    }

    pub fn deadline_for(&self, action: Action) -> Duration {
        match action {
            Action::Single(_) => self.single_deadline,
            Action::GenerateAll => self.batch_deadline,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn dispatch(&self, request: InsightRequest) -> Result<DispatchOutcome> {
        let mut state = DispatchState::Idle;
        let mut transition = |next: DispatchState| {
            debug!(from = %state, to = %next, action = %request.action, "Dispatch state");
            state = next;
        };

        transition(DispatchState::Routing);
        let RoutedRequest {
            action,
            integration_id,
            project_id,
        } = match request.route() {
            Ok(routed) => routed,
            Err(e) => {
                transition(DispatchState::Failed);
                return Err(e);
            }
        };

        transition(DispatchState::Executing);
        let deadline = self.deadline_for(action);
        let source = self.source.clone();
        let outcome = match action {
            Action::Single(kind) => {
                let pipeline = self.pipeline.clone();
                race_deadline(deadline, async move {
                    let project_id =
                        resolve_project(source.as_ref(), &integration_id, project_id).await?;
                    let run = pipeline.run(kind, &integration_id, &project_id).await?;
                    Ok::<_, PulseError>(DispatchOutcome::Single(run.insight.insight_data))
                })
                .await
            }
            Action::GenerateAll => {
                let orchestrator = self.orchestrator.clone();
                race_deadline(deadline, async move {
                    let project_id =
                        resolve_project(source.as_ref(), &integration_id, project_id).await?;
                    let summary = orchestrator.run_all(&integration_id, &project_id).await?;
                    Ok::<_, PulseError>(DispatchOutcome::Batch(summary))
                })
                .await
            }
        };

        match &outcome {
            Ok(_) => transition(DispatchState::Succeeded),
            Err(e @ PulseError::DispatchTimeout { .. }) => {
                warn!(
                    action = action.as_str(),
                    deadline_ms = deadline.as_millis() as u64,
                    error = %e,
                    "Deadline elapsed, work left running in background"
                );
                transition(DispatchState::TimedOut);
            }
            Err(_) => transition(DispatchState::Failed),
        }
        outcome
    }
}
