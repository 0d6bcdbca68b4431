use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The fixed set of analysis rubrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Security,
    CodeQuality,
    TestCoverage,
    Performance,
    PipelineHealth,
    DevPerformance,
    ReleasePrediction,
}

impl InsightType {
    /// Batch order.
    pub const ALL: [InsightType; 7] = [
        InsightType::Security,
        InsightType::CodeQuality,
        InsightType::TestCoverage,
        InsightType::Performance,
        InsightType::PipelineHealth,
        InsightType::DevPerformance,
        InsightType::ReleasePrediction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Security => "security",
            InsightType::CodeQuality => "code_quality",
            InsightType::TestCoverage => "test_coverage",
            InsightType::Performance => "performance",
            InsightType::PipelineHealth => "pipeline_health",
            InsightType::DevPerformance => "dev_performance",
            InsightType::ReleasePrediction => "release_prediction",
        }
    }
}

impl fmt::Display for InsightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsightType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InsightType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown insight type: {}", s))
    }
}

/// Coarse label attached to a persisted insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCategory {
    Security,
    Quality,
    Testing,
    Performance,
    Pipeline,
    DevPerformance,
    Release,
    General,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Security => "SECURITY",
            AlertCategory::Quality => "QUALITY",
            AlertCategory::Testing => "TESTING",
            AlertCategory::Performance => "PERFORMANCE",
            AlertCategory::Pipeline => "PIPELINE",
            AlertCategory::DevPerformance => "DEV_PERFORMANCE",
            AlertCategory::Release => "RELEASE",
            AlertCategory::General => "GENERAL",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SECURITY" => Ok(AlertCategory::Security),
            "QUALITY" => Ok(AlertCategory::Quality),
            "TESTING" => Ok(AlertCategory::Testing),
            "PERFORMANCE" => Ok(AlertCategory::Performance),
            "PIPELINE" => Ok(AlertCategory::Pipeline),
            "DEV_PERFORMANCE" => Ok(AlertCategory::DevPerformance),
            "RELEASE" => Ok(AlertCategory::Release),
            "GENERAL" => Ok(AlertCategory::General),
            other => Err(format!("unknown alert category: {}", other)),
        }
    }
}

/// Finding severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive match against the enumerated severities.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Number of source rows examined for one analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub repositories_analyzed: usize,
    pub commits_analyzed: usize,
    pub pull_requests_analyzed: usize,
    pub contributors_analyzed: usize,
    pub workflows_analyzed: usize,
    pub workflow_runs_analyzed: usize,
    pub releases_analyzed: usize,
}

impl Provenance {
    pub fn total(&self) -> usize {
        self.repositories_analyzed
            + self.commits_analyzed
            + self.pull_requests_analyzed
            + self.contributors_analyzed
            + self.workflows_analyzed
            + self.workflow_runs_analyzed
            + self.releases_analyzed
    }
}

/// Row handed to the insight store. `expires_at` is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInsight {
    pub project_id: String,
    pub insight_type: InsightType,
    pub confidence_score: f64,
    pub insight_data: serde_json::Value,
    pub executive_summary: String,
    pub alert_category: AlertCategory,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewInsight {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: impl Into<String>,
        insight_type: InsightType,
        confidence_score: f64,
        insight_data: serde_json::Value,
        executive_summary: impl Into<String>,
        alert_category: AlertCategory,
        generated_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            insight_type,
            confidence_score,
            insight_data,
            executive_summary: executive_summary.into(),
            alert_category,
            generated_at,
            expires_at: generated_at + ttl,
        }
    }
}

/// A persisted insight. Rows are append-only and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub project_id: String,
    pub insight_type: InsightType,
    pub confidence_score: f64,
    pub insight_data: serde_json::Value,
    pub executive_summary: String,
    pub alert_category: AlertCategory,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Insight {
    pub fn from_new(id: Uuid, row: NewInsight) -> Self {
        Self {
            id,
            project_id: row.project_id,
            insight_type: row.insight_type,
            confidence_score: row.confidence_score,
            insight_data: row.insight_data,
            executive_summary: row.executive_summary,
            alert_category: row.alert_category,
            generated_at: row.generated_at,
            expires_at: row.expires_at,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
