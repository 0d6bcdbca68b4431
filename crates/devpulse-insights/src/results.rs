//! Typed rubric results parsed from untrusted model output.
//!
//! Every field is optional. A field of the wrong type is treated as absent,
//! never as an error, so a structurally odd reply still yields a result.

use crate::rubric::{rubric, RubricSpec};
use devpulse_core::{AlertCategory, InsightType, Provenance, Severity};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Version of the output contract embedded in prompts and stored rows.
pub const SCHEMA_VERSION: u32 = 1;

/// One issue, alert, gap or risk reported by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl Finding {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) if !text.trim().is_empty() => Some(Finding {
                severity: Severity::Medium,
                title: text.trim().to_string(),
                description: None,
                recommendation: None,
            }),
            Value::Object(obj) => {
                let title = text_field(obj, &["title", "issue", "name", "description"])?;
                Some(Finding {
                    // Unrecognised severities never escalate.
                    severity: text_field(obj, &["severity", "level", "priority"])
                        .and_then(|s| Severity::parse_lenient(&s))
                        .unwrap_or(Severity::Low),
                    description: text_field(obj, &["description", "details"])
                        .filter(|d| *d != title),
                    recommendation: text_field(obj, &["recommendation", "fix", "mitigation"]),
                    title,
                })
            }
            _ => None,
        }
    }
}

/// CI/CD status reported by the pipeline-health rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Healthy,
    Degraded,
    Critical,
    NotConfigured,
    Unknown,
}

impl PipelineStatus {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "HEALTHY" | "GOOD" | "PASSING" => PipelineStatus::Healthy,
            "DEGRADED" | "WARNING" | "UNSTABLE" => PipelineStatus::Degraded,
            "CRITICAL" | "FAILING" | "BROKEN" => PipelineStatus::Critical,
            "NOT_CONFIGURED" => PipelineStatus::NotConfigured,
            _ => PipelineStatus::Unknown,
        }
    }
}

/// Rubric-specific fields beyond score, findings and recommendations.
#[derive(Debug, Clone, PartialEq)]
pub enum RubricDetails {
    Security,
    CodeQuality {
        technical_debt_hours: Option<f64>,
    },
    TestCoverage {
        estimated_coverage_percent: Option<f64>,
    },
    Performance,
    PipelineHealth {
        status: PipelineStatus,
        success_rate: Option<f64>,
        average_duration_minutes: Option<f64>,
    },
    DevPerformance {
        average_cycle_time_hours: Option<f64>,
        merged_per_week: Option<f64>,
    },
    ReleasePrediction {
        predicted_release_date: Option<String>,
        release_frequency_days: Option<f64>,
    },
}

/// Parsed result of one rubric run.
#[derive(Debug, Clone, PartialEq)]
pub struct RubricResult {
    pub kind: InsightType,
    /// Primary score in [0,1].
    pub score: Option<f64>,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<String>,
    /// Model self-reported confidence in [0,1], when well-formed.
    pub confidence: Option<f64>,
    pub details: RubricDetails,
}

impl RubricResult {
    /// Build a typed result from the model's JSON object, filling gaps leniently.
    pub fn from_model(kind: InsightType, obj: &Map<String, Value>) -> Self {
        let spec = rubric(kind);

        let findings = obj
            .get(spec.findings_field)
            .or_else(|| obj.get("findings"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Finding::from_value).collect())
            .unwrap_or_default();

        let recommendations = obj
            .get("recommendations")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                        Value::Object(o) => text_field(o, &["title", "recommendation", "action"]),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let details = match kind {
            InsightType::Security => RubricDetails::Security,
            InsightType::CodeQuality => RubricDetails::CodeQuality {
                technical_debt_hours: non_negative(obj.get("technical_debt_hours")),
            },
            InsightType::TestCoverage => RubricDetails::TestCoverage {
                estimated_coverage_percent: obj
                    .get("estimated_coverage_percent")
                    .and_then(finite)
                    .filter(|p| (0.0..=100.0).contains(p)),
            },
            InsightType::Performance => RubricDetails::Performance,
            InsightType::PipelineHealth => RubricDetails::PipelineHealth {
                status: obj
                    .get("status")
                    .and_then(Value::as_str)
                    .map(PipelineStatus::parse)
                    .unwrap_or(PipelineStatus::Unknown),
                success_rate: obj.get("success_rate").and_then(unit_score),
                average_duration_minutes: non_negative(obj.get("average_duration_minutes")),
            },
            InsightType::DevPerformance => RubricDetails::DevPerformance {
                average_cycle_time_hours: non_negative(obj.get("average_cycle_time_hours")),
                merged_per_week: non_negative(obj.get("merged_per_week")),
            },
            InsightType::ReleasePrediction => RubricDetails::ReleasePrediction {
                predicted_release_date: obj
                    .get("predicted_release_date")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                release_frequency_days: non_negative(obj.get("release_frequency_days")),
            },
        };

        Self {
            kind,
            score: obj.get(spec.score_field).and_then(unit_score),
            findings,
            recommendations,
            confidence: obj
                .get("confidence")
                .or_else(|| obj.get("confidence_score"))
                .and_then(finite)
                .filter(|c| (0.0..=1.0).contains(c)),
            details,
        }
    }

    /// Synthetic pipeline-health result for an integration with no workflows.
    pub fn pipeline_not_configured() -> Self {
        Self {
            kind: InsightType::PipelineHealth,
            score: Some(0.0),
            findings: Vec::new(),
            recommendations: vec![
                "Add a CI/CD workflow so builds and tests run on every change".to_string(),
            ],
            confidence: Some(1.0),
            details: RubricDetails::PipelineHealth {
                status: PipelineStatus::NotConfigured,
                success_rate: None,
                average_duration_minutes: None,
            },
        }
    }

    pub fn spec(&self) -> &'static RubricSpec {
        rubric(self.kind)
    }

    pub fn pipeline_status(&self) -> Option<PipelineStatus> {
        match self.details {
            RubricDetails::PipelineHealth { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn count_at(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Confidence to persist: the model's when well-formed, else the table default.
    pub fn confidence_or_default(&self) -> f64 {
        self.confidence.unwrap_or(self.spec().default_confidence)
    }

    pub fn alert_category(&self) -> AlertCategory {
        let pipeline_alarm = matches!(
            self.pipeline_status(),
            Some(PipelineStatus::NotConfigured) | Some(PipelineStatus::Critical)
        );
        if pipeline_alarm || self.worst_severity() == Some(Severity::Critical) {
            self.spec().category
        } else {
            AlertCategory::General
        }
    }

    /// Payload stored as `insight_data` and echoed to single-rubric callers.
    pub fn to_insight_data(&self, provenance: &Provenance) -> Value {
        let spec = self.spec();
        let mut data = Map::new();
        data.insert("schema_version".into(), json!(SCHEMA_VERSION));
        data.insert("insight_type".into(), json!(self.kind));
        data.insert(spec.score_field.into(), json!(self.score));
        data.insert(spec.findings_field.into(), json!(self.findings));
        data.insert("recommendations".into(), json!(self.recommendations));

        match &self.details {
            RubricDetails::Security | RubricDetails::Performance => {}
            RubricDetails::CodeQuality { technical_debt_hours } => {
                data.insert("technical_debt_hours".into(), json!(technical_debt_hours));
            }
            RubricDetails::TestCoverage {
                estimated_coverage_percent,
            } => {
                data.insert(
                    "estimated_coverage_percent".into(),
                    json!(estimated_coverage_percent),
                );
            }
            RubricDetails::PipelineHealth {
                status,
                success_rate,
                average_duration_minutes,
            } => {
                data.insert("status".into(), json!(status));
                data.insert("success_rate".into(), json!(success_rate));
                data.insert(
                    "average_duration_minutes".into(),
                    json!(average_duration_minutes),
                );
            }
            RubricDetails::DevPerformance {
                average_cycle_time_hours,
                merged_per_week,
            } => {
                data.insert(
                    "average_cycle_time_hours".into(),
                    json!(average_cycle_time_hours),
                );
                data.insert("merged_per_week".into(), json!(merged_per_week));
            }
            RubricDetails::ReleasePrediction {
                predicted_release_date,
                release_frequency_days,
            } => {
                data.insert(
                    "predicted_release_date".into(),
                    json!(predicted_release_date),
                );
                data.insert(
                    "release_frequency_days".into(),
                    json!(release_frequency_days),
                );
            }
        }

        data.insert("provenance".into(), json!(provenance));
        Value::Object(data)
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn finite(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn non_negative(value: Option<&Value>) -> Option<f64> {
    value.and_then(finite).filter(|v| *v >= 0.0)
}

/// Scores on a 0-100 scale are normalised; anything else out of range is dropped.
fn unit_score(value: &Value) -> Option<f64> {
    let raw = finite(value)?;
    if (0.0..=1.0).contains(&raw) {
        Some(raw)
    } else if raw > 1.0 && raw <= 100.0 {
        Some(raw / 100.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn security_result_reads_score_and_findings() {
        let result = RubricResult::from_model(
            InsightType::Security,
            &obj(json!({
                "security_score": 0.42,
                "vulnerabilities": [
                    {"severity": "critical", "title": "Hard-coded token", "recommendation": "Rotate it"},
                    {"severity": "LOW", "title": "Verbose errors"},
                    "Outdated dependency"
                ],
                "recommendations": ["Enable secret scanning"],
                "confidence": 0.9
            })),
        );
        assert_eq!(result.score, Some(0.42));
        assert_eq!(result.findings.len(), 3);
        assert_eq!(result.worst_severity(), Some(Severity::Critical));
        assert_eq!(result.findings[2].severity, Severity::Medium);
        assert_eq!(result.confidence_or_default(), 0.9);
        assert_eq!(result.alert_category(), AlertCategory::Security);
    }

    #[test]
    fn missing_or_malformed_confidence_uses_table_default() {
        let missing = RubricResult::from_model(InsightType::CodeQuality, &obj(json!({})));
        assert_eq!(missing.confidence_or_default(), 0.7);

        let wrong_type = RubricResult::from_model(
            InsightType::CodeQuality,
            &obj(json!({"confidence": "very"})),
        );
        assert_eq!(wrong_type.confidence_or_default(), 0.7);

        let out_of_range =
            RubricResult::from_model(InsightType::Security, &obj(json!({"confidence": 4.2})));
        assert_eq!(out_of_range.confidence_or_default(), 0.8);
    }

    #[test]
    fn percentage_scores_are_normalised() {
        let result = RubricResult::from_model(
            InsightType::TestCoverage,
            &obj(json!({"coverage_score": 65, "estimated_coverage_percent": "58%"})),
        );
        assert_eq!(result.score, Some(0.65));
        assert_eq!(
            result.details,
            RubricDetails::TestCoverage {
                estimated_coverage_percent: Some(58.0)
            }
        );

        let nonsense =
            RubricResult::from_model(InsightType::Performance, &obj(json!({"performance_score": -3})));
        assert_eq!(nonsense.score, None);
    }

    #[test]
    fn findings_of_the_wrong_shape_are_skipped() {
        let result = RubricResult::from_model(
            InsightType::CodeQuality,
            &obj(json!({"issues": [42, null, {"severity": "HIGH"}, {"title": "Long functions", "severity": "urgent"}]})),
        );
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].severity, Severity::Low);

        let not_a_list =
            RubricResult::from_model(InsightType::CodeQuality, &obj(json!({"issues": "many"})));
        assert!(not_a_list.findings.is_empty());
    }

    #[test]
    fn non_critical_results_are_general() {
        let result = RubricResult::from_model(
            InsightType::Performance,
            &obj(json!({"bottlenecks": [{"severity": "HIGH", "title": "Slow build"}]})),
        );
        assert_eq!(result.alert_category(), AlertCategory::General);
    }

    #[test]
    fn pipeline_status_drives_category() {
        let critical = RubricResult::from_model(
            InsightType::PipelineHealth,
            &obj(json!({"health_score": 0.3, "status": "critical"})),
        );
        assert_eq!(critical.alert_category(), AlertCategory::Pipeline);

        let fallback = RubricResult::pipeline_not_configured();
        assert_eq!(fallback.alert_category(), AlertCategory::Pipeline);
        assert_eq!(fallback.confidence_or_default(), 1.0);
    }

    #[test]
    fn insight_data_carries_provenance_and_rubric_fields() {
        let result = RubricResult::pipeline_not_configured();
        let provenance = Provenance {
            commits_analyzed: 12,
            ..Provenance::default()
        };
        let data = result.to_insight_data(&provenance);
        assert_eq!(data["status"], json!("NOT_CONFIGURED"));
        assert_eq!(data["health_score"], json!(0.0));
        assert_eq!(data["insight_type"], json!("pipeline_health"));
        assert_eq!(data["provenance"]["commits_analyzed"], json!(12));
        assert_eq!(data["alerts"], json!([]));
    }
}
