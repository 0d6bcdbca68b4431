use crate::results::{PipelineStatus, RubricResult};
use devpulse_core::Severity;

fn percent(score: f64) -> i64 {
    (score * 100.0).round() as i64
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("1 {}", word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// One-line, severity-tagged summary of a rubric result.
///
/// Critical findings produce an `URGENT:` line, a primary score under the
/// rubric cutoff produces a `WARNING:` line, anything else is neutral.
pub fn executive_summary(result: &RubricResult) -> String {
    let spec = result.spec();
    let name = spec.display_name;

    if result.pipeline_status() == Some(PipelineStatus::NotConfigured) {
        return "WARNING: No CI/CD workflows are configured for this integration.".to_string();
    }

    let critical = result.count_at(Severity::Critical);
    if critical > 0 {
        let lead = result
            .findings
            .iter()
            .find(|f| f.severity == Severity::Critical)
            .map(|f| format!(" Top issue: {}.", f.title.trim_end_matches('.')))
            .unwrap_or_default();
        return format!(
            "URGENT: {} analysis found {} requiring immediate attention.{}",
            name,
            plural(critical, "critical issue"),
            lead
        );
    }

    let flagged = result.findings.len();
    match result.score {
        Some(score) if score < spec.score_cutoff => format!(
            "WARNING: {} score is {}%, below the {}% target, with {} flagged.",
            name,
            percent(score),
            percent(spec.score_cutoff),
            plural(flagged, "issue")
        ),
        Some(score) => format!(
            "{} score is {}% with {} flagged.",
            name,
            percent(score),
            plural(flagged, "issue")
        ),
        None => format!(
            "{} analysis completed with {} flagged.",
            name,
            plural(flagged, "issue")
        ),
    }
}
