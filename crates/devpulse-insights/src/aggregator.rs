use crate::rubric::{rubric, SourceSlice};
use chrono::{DateTime, Duration, Utc};
use devpulse_core::{
    ActivitySource, Commit, Contributor, InsightType, PipelineConfig, Provenance, PullRequest,
    Release, Repository, Result, Workflow, WorkflowRun,
};
use std::sync::Arc;
use tracing::debug;

/// Row caps and window for one aggregation pass.
#[derive(Debug, Clone)]
pub struct AggregationLimits {
    pub lookback: Duration,
    pub commit_limit: usize,
    pub pull_request_limit: usize,
    pub contributor_limit: usize,
    pub workflow_run_limit: usize,
    pub release_limit: usize,
}

impl Default for AggregationLimits {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for AggregationLimits {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            lookback: cfg.lookback(),
            commit_limit: cfg.commit_limit,
            pull_request_limit: cfg.pull_request_limit,
            contributor_limit: 50,
            workflow_run_limit: 100,
            release_limit: 20,
        }
    }
}

/// Slices fetched for one rubric. Slices the rubric does not use stay empty.
#[derive(Debug, Clone, Default)]
pub struct AggregatedData {
    pub repositories: Vec<Repository>,
    pub commits: Vec<Commit>,
    pub merged_pull_requests: Vec<PullRequest>,
    pub open_pull_requests: Vec<PullRequest>,
    pub contributors: Vec<Contributor>,
    pub workflows: Vec<Workflow>,
    pub workflow_runs: Vec<WorkflowRun>,
    pub releases: Vec<Release>,
}

impl AggregatedData {
    pub fn is_empty(&self) -> bool {
        self.provenance().total() == 0
    }

    pub fn provenance(&self) -> Provenance {
        Provenance {
            repositories_analyzed: self.repositories.len(),
            commits_analyzed: self.commits.len(),
            pull_requests_analyzed: self.merged_pull_requests.len()
                + self.open_pull_requests.len(),
            contributors_analyzed: self.contributors.len(),
            workflows_analyzed: self.workflows.len(),
            workflow_runs_analyzed: self.workflow_runs.len(),
            releases_analyzed: self.releases.len(),
        }
    }
}

/// Bounded, read-only view over recent integration activity.
#[derive(Clone)]
pub struct ActivityAggregator {
    source: Arc<dyn ActivitySource>,
    limits: AggregationLimits,
}

impl ActivityAggregator {
    pub fn new(source: Arc<dyn ActivitySource>, limits: AggregationLimits) -> Self {
        Self { source, limits }
    }

    pub fn source(&self) -> &Arc<dyn ActivitySource> {
        &self.source
    }

    /// Fetch the slices `kind` needs. Empty results are returned as-is.
    pub async fn collect(
        &self,
        integration_id: &str,
        kind: InsightType,
        now: DateTime<Utc>,
    ) -> Result<AggregatedData> {
        let spec = rubric(kind);
        let limits = &self.limits;
        let mut data = AggregatedData::default();

        for slice in spec.slices {
            match slice {
                SourceSlice::Repositories => {
                    data.repositories = self.source.repositories(integration_id).await?;
                }
                SourceSlice::Commits => {
                    data.commits = self
                        .source
                        .recent_commits(integration_id, now - limits.lookback, limits.commit_limit)
                        .await?;
                }
                SourceSlice::MergedPullRequests => {
                    data.merged_pull_requests = self
                        .source
                        .merged_pull_requests(integration_id, limits.pull_request_limit)
                        .await?;
                }
                SourceSlice::OpenPullRequests => {
                    data.open_pull_requests = self
                        .source
                        .open_pull_requests(integration_id, limits.pull_request_limit)
                        .await?;
                }
                SourceSlice::Contributors => {
                    data.contributors = self
                        .source
                        .contributors(integration_id, limits.contributor_limit)
                        .await?;
                }
                SourceSlice::Workflows => {
                    data.workflows = self.source.workflows(integration_id).await?;
                }
                SourceSlice::WorkflowRuns => {
                    data.workflow_runs = self
                        .source
                        .workflow_runs(integration_id, limits.workflow_run_limit)
                        .await?;
                }
                SourceSlice::Releases => {
                    data.releases = self
                        .source
                        .releases(integration_id, limits.release_limit)
                        .await?;
                }
            }
        }

        debug!(
            insight_type = %kind,
            integration_id,
            rows = data.provenance().total(),
            "Aggregated activity"
        );
        Ok(data)
    }
}
