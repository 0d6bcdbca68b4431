//! Fixed per-rubric parameters, kept in one table.

use devpulse_core::{AlertCategory, InsightType};

/// Source slices a rubric can ask the aggregator for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceSlice {
    Repositories,
    Commits,
    MergedPullRequests,
    OpenPullRequests,
    Contributors,
    Workflows,
    WorkflowRuns,
    Releases,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubricSpec {
    pub kind: InsightType,
    pub display_name: &'static str,
    pub category: AlertCategory,
    /// Used when the model omits or garbles its own confidence.
    pub default_confidence: f64,
    /// Primary scores below this get a warning-tone summary.
    pub score_cutoff: f64,
    pub score_field: &'static str,
    pub findings_field: &'static str,
    pub slices: &'static [SourceSlice],
}

static RUBRICS: [RubricSpec; 7] = [
    RubricSpec {
        kind: InsightType::Security,
        display_name: "Security",
        category: AlertCategory::Security,
        default_confidence: 0.8,
        score_cutoff: 0.6,
        score_field: "security_score",
        findings_field: "vulnerabilities",
        slices: &[
            SourceSlice::Repositories,
            SourceSlice::Commits,
            SourceSlice::MergedPullRequests,
        ],
    },
    RubricSpec {
        kind: InsightType::CodeQuality,
        display_name: "Code quality",
        category: AlertCategory::Quality,
        default_confidence: 0.7,
        score_cutoff: 0.6,
        score_field: "quality_score",
        findings_field: "issues",
        slices: &[
            SourceSlice::Repositories,
            SourceSlice::Commits,
            SourceSlice::MergedPullRequests,
        ],
    },
    RubricSpec {
        kind: InsightType::TestCoverage,
        display_name: "Test coverage",
        category: AlertCategory::Testing,
        default_confidence: 0.7,
        score_cutoff: 0.5,
        score_field: "coverage_score",
        findings_field: "gaps",
        slices: &[
            SourceSlice::Commits,
            SourceSlice::MergedPullRequests,
            SourceSlice::WorkflowRuns,
        ],
    },
    RubricSpec {
        kind: InsightType::Performance,
        display_name: "Performance",
        category: AlertCategory::Performance,
        default_confidence: 0.75,
        score_cutoff: 0.6,
        score_field: "performance_score",
        findings_field: "bottlenecks",
        slices: &[
            SourceSlice::Repositories,
            SourceSlice::Commits,
            SourceSlice::WorkflowRuns,
        ],
    },
    RubricSpec {
        kind: InsightType::PipelineHealth,
        display_name: "Pipeline health",
        category: AlertCategory::Pipeline,
        default_confidence: 0.85,
        score_cutoff: 0.7,
        score_field: "health_score",
        findings_field: "alerts",
        slices: &[SourceSlice::Workflows, SourceSlice::WorkflowRuns],
    },
    RubricSpec {
        kind: InsightType::DevPerformance,
        display_name: "Developer performance",
        category: AlertCategory::DevPerformance,
        default_confidence: 0.75,
        score_cutoff: 0.5,
        score_field: "productivity_score",
        findings_field: "bottlenecks",
        slices: &[
            SourceSlice::Commits,
            SourceSlice::MergedPullRequests,
            SourceSlice::Contributors,
        ],
    },
    RubricSpec {
        kind: InsightType::ReleasePrediction,
        display_name: "Release readiness",
        category: AlertCategory::Release,
        default_confidence: 0.6,
        score_cutoff: 0.6,
        score_field: "readiness_score",
        findings_field: "risks",
        slices: &[
            SourceSlice::Releases,
            SourceSlice::MergedPullRequests,
            SourceSlice::OpenPullRequests,
        ],
    },
];

/// Table entry for `kind`.
pub fn rubric(kind: InsightType) -> &'static RubricSpec {
    match kind {
        InsightType::Security => &RUBRICS[0],
        InsightType::CodeQuality => &RUBRICS[1],
        InsightType::TestCoverage => &RUBRICS[2],
        InsightType::Performance => &RUBRICS[3],
        InsightType::PipelineHealth => &RUBRICS[4],
        InsightType::DevPerformance => &RUBRICS[5],
        InsightType::ReleasePrediction => &RUBRICS[6],
    }
}

impl RubricSpec {
    pub fn needs(&self, slice: SourceSlice) -> bool {
        self.slices.contains(&slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_keyed_consistently() {
        for kind in InsightType::ALL {
            assert_eq!(rubric(kind).kind, kind);
        }
    }

    #[test]
    fn default_confidences_are_unit_interval() {
        for kind in InsightType::ALL {
            let spec = rubric(kind);
            assert!((0.0..=1.0).contains(&spec.default_confidence));
            assert!((0.0..=1.0).contains(&spec.score_cutoff));
            assert!(!spec.slices.is_empty() && spec.slices.len() <= 3);
        }
        assert_eq!(rubric(InsightType::Security).default_confidence, 0.8);
        assert_eq!(rubric(InsightType::CodeQuality).default_confidence, 0.7);
        assert_eq!(rubric(InsightType::ReleasePrediction).default_confidence, 0.6);
    }

    #[test]
    fn pipeline_health_reads_workflows() {
        assert!(rubric(InsightType::PipelineHealth).needs(SourceSlice::Workflows));
        assert!(!rubric(InsightType::Security).needs(SourceSlice::Workflows));
    }
}
