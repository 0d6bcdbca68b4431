use crate::{
    Commit, Contributor, Insight, NewInsight, PullRequest, Release, Repository, Result, Workflow,
    WorkflowRun,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read contract over the tables populated by the sync connectors.
///
/// Every listing is newest-first and capped at `limit`. An empty result is
/// not an error.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Project that owns the integration, if known.
    async fn integration_project(&self, integration_id: &str) -> Result<Option<String>>;

    async fn repositories(&self, integration_id: &str) -> Result<Vec<Repository>>;

    /// Commits authored at or after `since`.
    async fn recent_commits(
        &self,
        integration_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Commit>>;

    /// Closed pull requests that were merged, ordered by merge time.
    async fn merged_pull_requests(
        &self,
        integration_id: &str,
        limit: usize,
    ) -> Result<Vec<PullRequest>>;

    async fn open_pull_requests(
        &self,
        integration_id: &str,
        limit: usize,
    ) -> Result<Vec<PullRequest>>;

    /// Ordered by contribution count, highest first.
    async fn contributors(&self, integration_id: &str, limit: usize) -> Result<Vec<Contributor>>;

    async fn workflows(&self, integration_id: &str) -> Result<Vec<Workflow>>;

    async fn workflow_runs(&self, integration_id: &str, limit: usize) -> Result<Vec<WorkflowRun>>;

    async fn releases(&self, integration_id: &str, limit: usize) -> Result<Vec<Release>>;
}

/// Append-only insight storage.
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Insert one row and return it with its generated id.
    async fn insert_insight(&self, insight: NewInsight) -> Result<Insight>;

    /// Rows for the project with `expires_at > now`, newest first.
    async fn active_insights(&self, project_id: &str, now: DateTime<Utc>) -> Result<Vec<Insight>>;
}
