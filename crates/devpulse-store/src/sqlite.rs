//! SQLite-backed store via sqlx.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use devpulse_core::{
    ActivitySource, AlertCategory, Commit, Contributor, Insight, InsightStore, InsightType,
    NewInsight, PulseError, PullRequest, PullRequestState, Release, Repository, Result, Workflow,
    WorkflowRun,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../migrations/001_initial.sql");

fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| PulseError::Store(format!("invalid timestamp {:?}: {}", raw, e)))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

fn read_err(e: sqlx::Error) -> PulseError {
    PulseError::Store(e.to_string())
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Database connection and operations
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite://devpulse.db`), creating the file if needed.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| PulseError::Config(format!("invalid database url {}: {}", url, e)))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(read_err)?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(url, "SQLite store ready");
        Ok(store)
    }

    /// Single-connection in-memory database (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(read_err)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| PulseError::Store(format!("migration failed: {}", e)))?;
        debug!("Schema migrations applied");
        Ok(())
    }

    // ==================== Source writes (sync connectors, fixtures) ====================

    pub async fn register_integration(&self, integration_id: &str, project_id: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO integrations (id, project_id) VALUES (?, ?)")
            .bind(integration_id)
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(read_err)?;
        Ok(())
    }

    pub async fn upsert_repository(&self, repo: &Repository) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO repositories \
             (id, integration_id, name, full_name, language, default_branch, is_private, open_issues_count, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&repo.id)
        .bind(&repo.integration_id)
        .bind(&repo.name)
        .bind(&repo.full_name)
        .bind(&repo.language)
        .bind(&repo.default_branch)
        .bind(repo.is_private)
        .bind(repo.open_issues_count)
        .bind(ts(&repo.updated_at))
        .execute(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(())
    }

    pub async fn upsert_commit(&self, commit: &Commit) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO commits \
             (sha, integration_id, repository_id, author_login, message, additions, deletions, files_changed, committed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&commit.sha)
        .bind(&commit.integration_id)
        .bind(&commit.repository_id)
        .bind(&commit.author_login)
        .bind(&commit.message)
        .bind(commit.additions)
        .bind(commit.deletions)
        .bind(commit.files_changed)
        .bind(ts(&commit.committed_at))
        .execute(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(())
    }

    pub async fn upsert_pull_request(&self, pr: &PullRequest) -> Result<()> {
        let state = match pr.state {
            PullRequestState::Open => "open",
            PullRequestState::Closed => "closed",
        };
        sqlx::query(
            "INSERT OR REPLACE INTO pull_requests \
             (id, integration_id, repository_id, number, title, state, author_login, additions, deletions, review_comments, created_at, closed_at, merged_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&pr.id)
        .bind(&pr.integration_id)
        .bind(&pr.repository_id)
        .bind(pr.number)
        .bind(&pr.title)
        .bind(state)
        .bind(&pr.author_login)
        .bind(pr.additions)
        .bind(pr.deletions)
        .bind(pr.review_comments)
        .bind(ts(&pr.created_at))
        .bind(pr.closed_at.as_ref().map(ts))
        .bind(pr.merged_at.as_ref().map(ts))
        .execute(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(())
    }

    pub async fn upsert_contributor(&self, contributor: &Contributor) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO contributors (login, integration_id, contributions) VALUES (?, ?, ?)",
        )
        .bind(&contributor.login)
        .bind(&contributor.integration_id)
        .bind(contributor.contributions)
        .execute(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(())
    }

    pub async fn upsert_workflow(&self, workflow: &Workflow) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO workflows (id, integration_id, name, path, state) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&workflow.id)
        .bind(&workflow.integration_id)
        .bind(&workflow.name)
        .bind(&workflow.path)
        .bind(&workflow.state)
        .execute(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(())
    }

    pub async fn upsert_workflow_run(&self, run: &WorkflowRun) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO workflow_runs \
             (id, integration_id, workflow_id, status, conclusion, head_branch, duration_seconds, started_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(&run.integration_id)
        .bind(&run.workflow_id)
        .bind(&run.status)
        .bind(&run.conclusion)
        .bind(&run.head_branch)
        .bind(run.duration_seconds)
        .bind(ts(&run.started_at))
        .execute(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(())
    }

    pub async fn upsert_release(&self, release: &Release) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO releases (id, integration_id, tag_name, name, draft, prerelease, published_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&release.id)
        .bind(&release.integration_id)
        .bind(&release.tag_name)
        .bind(&release.name)
        .bind(release.draft)
        .bind(release.prerelease)
        .bind(release.published_at.as_ref().map(ts))
        .execute(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(())
    }
}

// ==================== Row mapping ====================

fn repository_from_row(row: &SqliteRow) -> Result<Repository> {
    Ok(Repository {
        id: row.try_get("id").map_err(read_err)?,
        integration_id: row.try_get("integration_id").map_err(read_err)?,
        name: row.try_get("name").map_err(read_err)?,
        full_name: row.try_get("full_name").map_err(read_err)?,
        language: row.try_get("language").map_err(read_err)?,
        default_branch: row.try_get("default_branch").map_err(read_err)?,
        is_private: row.try_get("is_private").map_err(read_err)?,
        open_issues_count: row.try_get("open_issues_count").map_err(read_err)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at").map_err(read_err)?)?,
    })
}

fn commit_from_row(row: &SqliteRow) -> Result<Commit> {
    Ok(Commit {
        sha: row.try_get("sha").map_err(read_err)?,
        integration_id: row.try_get("integration_id").map_err(read_err)?,
        repository_id: row.try_get("repository_id").map_err(read_err)?,
        author_login: row.try_get("author_login").map_err(read_err)?,
        message: row.try_get("message").map_err(read_err)?,
        additions: row.try_get("additions").map_err(read_err)?,
        deletions: row.try_get("deletions").map_err(read_err)?,
        files_changed: row.try_get("files_changed").map_err(read_err)?,
        committed_at: parse_ts(&row.try_get::<String, _>("committed_at").map_err(read_err)?)?,
    })
}

fn pull_request_from_row(row: &SqliteRow) -> Result<PullRequest> {
    let state: String = row.try_get("state").map_err(read_err)?;
    Ok(PullRequest {
        id: row.try_get("id").map_err(read_err)?,
        integration_id: row.try_get("integration_id").map_err(read_err)?,
        repository_id: row.try_get("repository_id").map_err(read_err)?,
        number: row.try_get("number").map_err(read_err)?,
        title: row.try_get("title").map_err(read_err)?,
        state: if state == "open" {
            PullRequestState::Open
        } else {
            PullRequestState::Closed
        },
        author_login: row.try_get("author_login").map_err(read_err)?,
        additions: row.try_get("additions").map_err(read_err)?,
        deletions: row.try_get("deletions").map_err(read_err)?,
        review_comments: row.try_get("review_comments").map_err(read_err)?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at").map_err(read_err)?)?,
        closed_at: parse_opt_ts(row.try_get("closed_at").map_err(read_err)?)?,
        merged_at: parse_opt_ts(row.try_get("merged_at").map_err(read_err)?)?,
    })
}

fn contributor_from_row(row: &SqliteRow) -> Result<Contributor> {
    Ok(Contributor {
        login: row.try_get("login").map_err(read_err)?,
        integration_id: row.try_get("integration_id").map_err(read_err)?,
        contributions: row.try_get("contributions").map_err(read_err)?,
    })
}

fn workflow_from_row(row: &SqliteRow) -> Result<Workflow> {
    Ok(Workflow {
        id: row.try_get("id").map_err(read_err)?,
        integration_id: row.try_get("integration_id").map_err(read_err)?,
        name: row.try_get("name").map_err(read_err)?,
        path: row.try_get("path").map_err(read_err)?,
        state: row.try_get("state").map_err(read_err)?,
    })
}

fn workflow_run_from_row(row: &SqliteRow) -> Result<WorkflowRun> {
    Ok(WorkflowRun {
        id: row.try_get("id").map_err(read_err)?,
        integration_id: row.try_get("integration_id").map_err(read_err)?,
        workflow_id: row.try_get("workflow_id").map_err(read_err)?,
        status: row.try_get("status").map_err(read_err)?,
        conclusion: row.try_get("conclusion").map_err(read_err)?,
        head_branch: row.try_get("head_branch").map_err(read_err)?,
        duration_seconds: row.try_get("duration_seconds").map_err(read_err)?,
        started_at: parse_ts(&row.try_get::<String, _>("started_at").map_err(read_err)?)?,
    })
}

fn release_from_row(row: &SqliteRow) -> Result<Release> {
    Ok(Release {
        id: row.try_get("id").map_err(read_err)?,
        integration_id: row.try_get("integration_id").map_err(read_err)?,
        tag_name: row.try_get("tag_name").map_err(read_err)?,
        name: row.try_get("name").map_err(read_err)?,
        draft: row.try_get("draft").map_err(read_err)?,
        prerelease: row.try_get("prerelease").map_err(read_err)?,
        published_at: parse_opt_ts(row.try_get("published_at").map_err(read_err)?)?,
    })
}

fn insight_from_row(row: &SqliteRow) -> Result<Insight> {
    let id: String = row.try_get("id").map_err(read_err)?;
    let insight_type: String = row.try_get("insight_type").map_err(read_err)?;
    let alert_category: String = row.try_get("alert_category").map_err(read_err)?;
    let insight_data: String = row.try_get("insight_data").map_err(read_err)?;

    Ok(Insight {
        id: Uuid::parse_str(&id).map_err(|e| PulseError::Store(e.to_string()))?,
        project_id: row.try_get("project_id").map_err(read_err)?,
        insight_type: InsightType::from_str(&insight_type).map_err(PulseError::Store)?,
        confidence_score: row.try_get("confidence_score").map_err(read_err)?,
        insight_data: serde_json::from_str(&insight_data)
            .map_err(|e| PulseError::Store(e.to_string()))?,
        executive_summary: row.try_get("executive_summary").map_err(read_err)?,
        alert_category: AlertCategory::from_str(&alert_category).map_err(PulseError::Store)?,
        generated_at: parse_ts(&row.try_get::<String, _>("generated_at").map_err(read_err)?)?,
        expires_at: parse_ts(&row.try_get::<String, _>("expires_at").map_err(read_err)?)?,
    })
}

fn map_rows<T>(rows: Vec<SqliteRow>, f: fn(&SqliteRow) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(f).collect()
}

#[async_trait]
impl ActivitySource for SqliteStore {
    async fn integration_project(&self, integration_id: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT project_id FROM integrations WHERE id = ?")
            .bind(integration_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)
    }

    async fn repositories(&self, integration_id: &str) -> Result<Vec<Repository>> {
        let rows = sqlx::query(
            "SELECT * FROM repositories WHERE integration_id = ? ORDER BY updated_at DESC",
        )
        .bind(integration_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;
        map_rows(rows, repository_from_row)
    }

    async fn recent_commits(
        &self,
        integration_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Commit>> {
        let rows = sqlx::query(
            "SELECT * FROM commits WHERE integration_id = ? AND committed_at >= ? \
             ORDER BY committed_at DESC LIMIT ?",
        )
        .bind(integration_id)
        .bind(ts(&since))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;
        map_rows(rows, commit_from_row)
    }

    async fn merged_pull_requests(
        &self,
        integration_id: &str,
        limit: usize,
    ) -> Result<Vec<PullRequest>> {
        let rows = sqlx::query(
            "SELECT * FROM pull_requests \
             WHERE integration_id = ? AND state = 'closed' AND merged_at IS NOT NULL \
             ORDER BY merged_at DESC LIMIT ?",
        )
        .bind(integration_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;
        map_rows(rows, pull_request_from_row)
    }

    async fn open_pull_requests(
        &self,
        integration_id: &str,
        limit: usize,
    ) -> Result<Vec<PullRequest>> {
        let rows = sqlx::query(
            "SELECT * FROM pull_requests WHERE integration_id = ? AND state = 'open' \
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(integration_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;
        map_rows(rows, pull_request_from_row)
    }

    async fn contributors(&self, integration_id: &str, limit: usize) -> Result<Vec<Contributor>> {
        let rows = sqlx::query(
            "SELECT * FROM contributors WHERE integration_id = ? \
             ORDER BY contributions DESC LIMIT ?",
        )
        .bind(integration_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;
        map_rows(rows, contributor_from_row)
    }

    async fn workflows(&self, integration_id: &str) -> Result<Vec<Workflow>> {
        let rows = sqlx::query("SELECT * FROM workflows WHERE integration_id = ? ORDER BY name")
            .bind(integration_id)
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;
        map_rows(rows, workflow_from_row)
    }

    async fn workflow_runs(&self, integration_id: &str, limit: usize) -> Result<Vec<WorkflowRun>> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_runs WHERE integration_id = ? \
             ORDER BY started_at DESC LIMIT ?",
        )
        .bind(integration_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;
        map_rows(rows, workflow_run_from_row)
    }

    async fn releases(&self, integration_id: &str, limit: usize) -> Result<Vec<Release>> {
        let rows = sqlx::query(
            "SELECT * FROM releases WHERE integration_id = ? \
             ORDER BY published_at IS NULL, published_at DESC LIMIT ?",
        )
        .bind(integration_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;
        map_rows(rows, release_from_row)
    }
}

#[async_trait]
impl InsightStore for SqliteStore {
    async fn insert_insight(&self, insight: NewInsight) -> Result<Insight> {
        let row = Insight::from_new(Uuid::new_v4(), insight);
        let data = serde_json::to_string(&row.insight_data)
            .map_err(|e| PulseError::Persistence(e.to_string()))?;

        sqlx::query(
            "INSERT INTO insights \
             (id, project_id, insight_type, confidence_score, insight_data, executive_summary, alert_category, generated_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.id.to_string())
        .bind(&row.project_id)
        .bind(row.insight_type.as_str())
        .bind(row.confidence_score)
        .bind(data)
        .bind(&row.executive_summary)
        .bind(row.alert_category.as_str())
        .bind(ts(&row.generated_at))
        .bind(ts(&row.expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| PulseError::Persistence(e.to_string()))?;

        Ok(row)
    }

    async fn active_insights(&self, project_id: &str, now: DateTime<Utc>) -> Result<Vec<Insight>> {
        let rows = sqlx::query(
            "SELECT * FROM insights WHERE project_id = ? AND expires_at > ? \
             ORDER BY generated_at DESC",
        )
        .bind(project_id)
        .bind(ts(&now))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;
        map_rows(rows, insight_from_row)
    }
}
