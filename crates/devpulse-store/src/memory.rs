use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devpulse_core::{
    ActivitySource, Commit, Contributor, Insight, InsightStore, NewInsight, PullRequest,
    PullRequestState, Release, Repository, Result, Workflow, WorkflowRun,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    integrations: HashMap<String, String>,
    repositories: Vec<Repository>,
    commits: Vec<Commit>,
    pull_requests: Vec<PullRequest>,
    contributors: Vec<Contributor>,
    workflows: Vec<Workflow>,
    workflow_runs: Vec<WorkflowRun>,
    releases: Vec<Release>,
    insights: Vec<Insight>,
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_integration(&self, integration_id: &str, project_id: &str) {
        self.tables
            .write()
            .integrations
            .insert(integration_id.to_string(), project_id.to_string());
    }

    pub fn add_repository(&self, repository: Repository) {
        self.tables.write().repositories.push(repository);
    }

    pub fn add_commit(&self, commit: Commit) {
        self.tables.write().commits.push(commit);
    }

    pub fn add_pull_request(&self, pull_request: PullRequest) {
        self.tables.write().pull_requests.push(pull_request);
    }

    pub fn add_contributor(&self, contributor: Contributor) {
        self.tables.write().contributors.push(contributor);
    }

    pub fn add_workflow(&self, workflow: Workflow) {
        self.tables.write().workflows.push(workflow);
    }

    pub fn add_workflow_run(&self, run: WorkflowRun) {
        self.tables.write().workflow_runs.push(run);
    }

    pub fn add_release(&self, release: Release) {
        self.tables.write().releases.push(release);
    }

    /// Every persisted insight, including expired ones, in insert order.
    pub fn all_insights(&self) -> Vec<Insight> {
        self.tables.read().insights.clone()
    }
}

fn newest_first<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K, limit: usize) -> Vec<T> {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows.truncate(limit);
    rows
}

#[async_trait]
impl ActivitySource for MemoryStore {
    async fn integration_project(&self, integration_id: &str) -> Result<Option<String>> {
        Ok(self.tables.read().integrations.get(integration_id).cloned())
    }

    async fn repositories(&self, integration_id: &str) -> Result<Vec<Repository>> {
        let rows = self
            .tables
            .read()
            .repositories
            .iter()
            .filter(|r| r.integration_id == integration_id)
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows, |r: &Repository| r.updated_at, usize::MAX))
    }

    async fn recent_commits(
        &self,
        integration_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Commit>> {
        let rows = self
            .tables
            .read()
            .commits
            .iter()
            .filter(|c| c.integration_id == integration_id && c.committed_at >= since)
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows, |c: &Commit| c.committed_at, limit))
    }

    async fn merged_pull_requests(
        &self,
        integration_id: &str,
        limit: usize,
    ) -> Result<Vec<PullRequest>> {
        let rows = self
            .tables
            .read()
            .pull_requests
            .iter()
            .filter(|p| p.integration_id == integration_id && p.is_merged())
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows, |p: &PullRequest| p.merged_at, limit))
    }

    async fn open_pull_requests(
        &self,
        integration_id: &str,
        limit: usize,
    ) -> Result<Vec<PullRequest>> {
        let rows = self
            .tables
            .read()
            .pull_requests
            .iter()
            .filter(|p| p.integration_id == integration_id && p.state == PullRequestState::Open)
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows, |p: &PullRequest| p.created_at, limit))
    }

    async fn contributors(&self, integration_id: &str, limit: usize) -> Result<Vec<Contributor>> {
        let rows = self
            .tables
            .read()
            .contributors
            .iter()
            .filter(|c| c.integration_id == integration_id)
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows, |c: &Contributor| c.contributions, limit))
    }

    async fn workflows(&self, integration_id: &str) -> Result<Vec<Workflow>> {
        Ok(self
            .tables
            .read()
            .workflows
            .iter()
            .filter(|w| w.integration_id == integration_id)
            .cloned()
            .collect())
    }

    async fn workflow_runs(&self, integration_id: &str, limit: usize) -> Result<Vec<WorkflowRun>> {
        let rows = self
            .tables
            .read()
            .workflow_runs
            .iter()
            .filter(|r| r.integration_id == integration_id)
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows, |r: &WorkflowRun| r.started_at, limit))
    }

    async fn releases(&self, integration_id: &str, limit: usize) -> Result<Vec<Release>> {
        let rows = self
            .tables
            .read()
            .releases
            .iter()
            .filter(|r| r.integration_id == integration_id)
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows, |r: &Release| r.published_at, limit))
    }
}

#[async_trait]
impl InsightStore for MemoryStore {
    async fn insert_insight(&self, insight: NewInsight) -> Result<Insight> {
        let row = Insight::from_new(Uuid::new_v4(), insight);
        self.tables.write().insights.push(row.clone());
        Ok(row)
    }

    async fn active_insights(&self, project_id: &str, now: DateTime<Utc>) -> Result<Vec<Insight>> {
        let rows = self
            .tables
            .read()
            .insights
            .iter()
            .filter(|i| i.project_id == project_id && i.is_active(now))
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows, |i: &Insight| i.generated_at, usize::MAX))
    }
}
