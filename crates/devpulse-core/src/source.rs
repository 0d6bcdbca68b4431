//! Source entities populated by the sync connectors. Read-only here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub integration_id: String,
    pub name: String,
    pub full_name: String,
    pub language: Option<String>,
    pub default_branch: Option<String>,
    pub is_private: bool,
    pub open_issues_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub integration_id: String,
    pub repository_id: String,
    pub author_login: Option<String>,
    pub message: String,
    pub additions: i64,
    pub deletions: i64,
    pub files_changed: i64,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: String,
    pub integration_id: String,
    pub repository_id: String,
    pub number: i64,
    pub title: String,
    pub state: PullRequestState,
    pub author_login: Option<String>,
    pub additions: i64,
    pub deletions: i64,
    pub review_comments: i64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.state == PullRequestState::Closed && self.merged_at.is_some()
    }

    /// Hours from open to merge, when merged.
    pub fn cycle_time_hours(&self) -> Option<f64> {
        self.merged_at
            .map(|merged| (merged - self.created_at).num_minutes() as f64 / 60.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub integration_id: String,
    pub contributions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub integration_id: String,
    pub name: String,
    pub path: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: String,
    pub integration_id: String,
    pub workflow_id: String,
    pub status: String,
    /// `success`, `failure`, `cancelled`, ... or `None` while still running.
    pub conclusion: Option<String>,
    pub head_branch: Option<String>,
    pub duration_seconds: Option<i64>,
    pub started_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn succeeded(&self) -> bool {
        self.conclusion.as_deref() == Some("success")
    }

    pub fn failed(&self) -> bool {
        matches!(self.conclusion.as_deref(), Some("failure") | Some("timed_out"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub integration_id: String,
    pub tag_name: String,
    pub name: Option<String>,
    pub draft: bool,
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn merged_pull_request_reports_cycle_time() {
        let created = Utc::now() - Duration::hours(30);
        let pr = PullRequest {
            id: "pr-1".into(),
            integration_id: "int".into(),
            repository_id: "repo".into(),
            number: 7,
            title: "Add feature".into(),
            state: PullRequestState::Closed,
            author_login: None,
            additions: 10,
            deletions: 2,
            review_comments: 1,
            created_at: created,
            closed_at: Some(created + Duration::hours(6)),
            merged_at: Some(created + Duration::hours(6)),
        };
        assert!(pr.is_merged());
        assert_eq!(pr.cycle_time_hours(), Some(6.0));
    }
}
