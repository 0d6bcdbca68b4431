//! Deterministic prompt rendering, one template per rubric.

use crate::aggregator::AggregatedData;
use crate::results::SCHEMA_VERSION;
use crate::rubric::{rubric, SourceSlice};
use devpulse_core::{InsightType, PullRequest};
use serde_json::{json, Value};
use std::fmt::Write;

const SEVERITIES: &str = "CRITICAL|HIGH|MEDIUM|LOW";

fn instruction(kind: InsightType) -> &'static str {
    match kind {
        InsightType::Security => {
            "Assess the security posture of this codebase from its recent activity. \
             Look for risky changes such as credential handling, dependency bumps, \
             authentication code, disabled checks and unreviewed merges."
        }
        InsightType::CodeQuality => {
            "Assess code quality from recent commits and merged pull requests. \
             Consider change size, churn, commit message discipline, review depth \
             and signs of accumulating technical debt."
        }
        InsightType::TestCoverage => {
            "Estimate how well changes are covered by automated tests. Consider \
             whether commits and pull requests touch tests and whether CI runs \
             exercise them reliably."
        }
        InsightType::Performance => {
            "Identify performance risks and bottlenecks visible in recent changes \
             and CI run durations."
        }
        InsightType::PipelineHealth => {
            "Evaluate the health of the CI/CD pipelines: success rate, duration \
             trends, flaky or failing workflows and branch coverage."
        }
        InsightType::DevPerformance => {
            "Evaluate team delivery throughput: commit cadence, pull request cycle \
             time, review load and contributor distribution. Do not rank individuals."
        }
        InsightType::ReleasePrediction => {
            "Assess release readiness and predict the next release date from the \
             release history and the state of pending and recently merged work."
        }
    }
}

fn schema(kind: InsightType) -> String {
    let spec = rubric(kind);
    let finding = format!(
        r#"{{"severity": "{}", "title": string, "description": string, "recommendation": string}}"#,
        SEVERITIES
    );

    let extra = match kind {
        InsightType::Security | InsightType::Performance => String::new(),
        InsightType::CodeQuality => ",\n  \"technical_debt_hours\": number >= 0".to_string(),
        InsightType::TestCoverage => {
            ",\n  \"estimated_coverage_percent\": number between 0 and 100".to_string()
        }
        InsightType::PipelineHealth => concat!(
            ",\n  \"status\": \"HEALTHY|DEGRADED|CRITICAL\"",
            ",\n  \"success_rate\": number between 0 and 1",
            ",\n  \"average_duration_minutes\": number >= 0"
        )
        .to_string(),
        InsightType::DevPerformance => concat!(
            ",\n  \"average_cycle_time_hours\": number >= 0",
            ",\n  \"merged_per_week\": number >= 0"
        )
        .to_string(),
        InsightType::ReleasePrediction => concat!(
            ",\n  \"predicted_release_date\": \"YYYY-MM-DD\" or null",
            ",\n  \"release_frequency_days\": number >= 0"
        )
        .to_string(),
    };

    format!(
        "{{\n  \"{score}\": number between 0 and 1,\n  \"{findings}\": [{finding}]{extra},\n  \"recommendations\": [string],\n  \"confidence\": number between 0 and 1\n}}",
        score = spec.score_field,
        findings = spec.findings_field,
        finding = finding,
        extra = extra,
    )
}

fn pull_request_row(pr: &PullRequest) -> Value {
    json!({
        "number": pr.number,
        "title": pr.title,
        "additions": pr.additions,
        "deletions": pr.deletions,
        "review_comments": pr.review_comments,
        "cycle_time_hours": pr.cycle_time_hours(),
    })
}

fn sample<T>(rows: &[T], limit: usize, render: impl Fn(&T) -> Value) -> String {
    let items: Vec<Value> = rows.iter().take(limit).map(render).collect();
    serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
}

fn section(out: &mut String, title: &str, total: usize, shown: usize, body: String) {
    let _ = writeln!(out, "### {} ({} total, showing {})", title, total, shown.min(total));
    let _ = writeln!(out, "{}\n", body);
}

fn statistics(kind: InsightType, data: &AggregatedData) -> Vec<String> {
    let mut lines = Vec::new();
    let spec = rubric(kind);

    if spec.needs(SourceSlice::Commits) && !data.commits.is_empty() {
        let churn: i64 = data.commits.iter().map(|c| c.additions + c.deletions).sum();
        lines.push(format!(
            "Average lines changed per commit: {:.1}",
            churn as f64 / data.commits.len() as f64
        ));
    }

    if spec.needs(SourceSlice::MergedPullRequests) {
        let cycle: Vec<f64> = data
            .merged_pull_requests
            .iter()
            .filter_map(PullRequest::cycle_time_hours)
            .collect();
        if !cycle.is_empty() {
            lines.push(format!(
                "Average pull request cycle time: {:.1} hours",
                cycle.iter().sum::<f64>() / cycle.len() as f64
            ));
        }
    }

    if spec.needs(SourceSlice::WorkflowRuns) {
        let finished: Vec<_> = data
            .workflow_runs
            .iter()
            .filter(|r| r.conclusion.is_some())
            .collect();
        if !finished.is_empty() {
            let succeeded = finished.iter().filter(|r| r.succeeded()).count();
            lines.push(format!(
                "Workflow run success rate: {:.1}% ({} of {} finished runs)",
                succeeded as f64 * 100.0 / finished.len() as f64,
                succeeded,
                finished.len()
            ));
        }
        let durations: Vec<i64> = data
            .workflow_runs
            .iter()
            .filter_map(|r| r.duration_seconds)
            .collect();
        if !durations.is_empty() {
            lines.push(format!(
                "Average workflow run duration: {:.1} minutes",
                durations.iter().sum::<i64>() as f64 / durations.len() as f64 / 60.0
            ));
        }
    }

    if spec.needs(SourceSlice::Contributors) && !data.contributors.is_empty() {
        lines.push(format!("Active contributors: {}", data.contributors.len()));
    }

    lines
}

/// Render the analysis prompt for `kind`. Identical inputs yield identical text.
pub fn build_prompt(kind: InsightType, data: &AggregatedData, sample_size: usize) -> String {
    let spec = rubric(kind);
    let mut out = String::new();

    let _ = writeln!(out, "## {} analysis\n", spec.display_name);
    let _ = writeln!(out, "{}\n", instruction(kind));

    let stats = statistics(kind, data);
    if !stats.is_empty() {
        let _ = writeln!(out, "### Summary statistics");
        for line in stats {
            let _ = writeln!(out, "- {}", line);
        }
        let _ = writeln!(out);
    }

    for slice in spec.slices {
        match slice {
            SourceSlice::Repositories => section(
                &mut out,
                "Repositories",
                data.repositories.len(),
                sample_size,
                sample(&data.repositories, sample_size, |r| {
                    json!({
                        "name": r.full_name,
                        "language": r.language,
                        "private": r.is_private,
                        "open_issues": r.open_issues_count,
                    })
                }),
            ),
            SourceSlice::Commits => section(
                &mut out,
                "Recent commits",
                data.commits.len(),
                sample_size,
                sample(&data.commits, sample_size, |c| {
                    json!({
                        "sha": c.sha.chars().take(7).collect::<String>(),
                        "message": c.message.lines().next().unwrap_or_default(),
                        "additions": c.additions,
                        "deletions": c.deletions,
                        "files_changed": c.files_changed,
                    })
                }),
            ),
            SourceSlice::MergedPullRequests => section(
                &mut out,
                "Merged pull requests",
                data.merged_pull_requests.len(),
                sample_size,
                sample(&data.merged_pull_requests, sample_size, pull_request_row),
            ),
            SourceSlice::OpenPullRequests => section(
                &mut out,
                "Open pull requests",
                data.open_pull_requests.len(),
                sample_size,
                sample(&data.open_pull_requests, sample_size, pull_request_row),
            ),
            SourceSlice::Contributors => section(
                &mut out,
                "Contributors",
                data.contributors.len(),
                sample_size,
                sample(&data.contributors, sample_size, |c| {
                    json!({"login": c.login, "contributions": c.contributions})
                }),
            ),
            SourceSlice::Workflows => section(
                &mut out,
                "Workflows",
                data.workflows.len(),
                sample_size,
                sample(&data.workflows, sample_size, |w| {
                    json!({"name": w.name, "path": w.path, "state": w.state})
                }),
            ),
            SourceSlice::WorkflowRuns => section(
                &mut out,
                "Workflow runs",
                data.workflow_runs.len(),
                sample_size,
                sample(&data.workflow_runs, sample_size, |r| {
                    json!({
                        "workflow_id": r.workflow_id,
                        "status": r.status,
                        "conclusion": r.conclusion,
                        "branch": r.head_branch,
                        "duration_seconds": r.duration_seconds,
                    })
                }),
            ),
            SourceSlice::Releases => section(
                &mut out,
                "Releases",
                data.releases.len(),
                sample_size,
                sample(&data.releases, sample_size, |r| {
                    json!({
                        "tag": r.tag_name,
                        "prerelease": r.prerelease,
                        "draft": r.draft,
                        "published_at": r.published_at.map(|t| t.format("%Y-%m-%d").to_string()),
                    })
                }),
            ),
        }
    }

    let _ = writeln!(
        out,
        "### Required output (schema version {})\nRespond with exactly one JSON object of this shape. \
         Severity must be one of {}. Scores and confidence are between 0 and 1.\n{}",
        SCHEMA_VERSION,
        SEVERITIES,
        schema(kind)
    );

    out
}
