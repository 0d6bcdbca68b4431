use crate::InsightType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("No activity data available for {insight_type} analysis of integration {integration_id}")]
    DataUnavailable {
        insight_type: InsightType,
        integration_id: String,
    },

    #[error("Model call timed out after {timeout_ms}ms")]
    ModelTimeout { timeout_ms: u64 },

    #[error("Model service returned HTTP {status}: {body}")]
    ModelHttp { status: u16, body: String },

    #[error("Model call cancelled")]
    Cancelled,

    #[error("Model request failed: {0}")]
    ModelTransport(String),

    #[error("Could not parse model response as JSON: {reason}")]
    ResponseParse { reason: String, raw: String },

    #[error("Failed to persist insight: {0}")]
    Persistence(String),

    #[error("Request timed out after {elapsed_ms}ms")]
    DispatchTimeout { elapsed_ms: u64 },

    #[error("Store read failed: {0}")]
    Store(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All {attempted} insight generations failed: {}", summarize_failures(.failures))]
    BatchFailed {
        attempted: usize,
        failures: Vec<RubricFailure>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One rubric that failed inside a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubricFailure {
    pub insight_type: InsightType,
    pub code: &'static str,
    pub message: String,
}

fn summarize_failures(failures: &[RubricFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}={}", f.insight_type, f.code))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PulseError {
    /// Stable machine-readable code surfaced to HTTP callers.
    pub fn code(&self) -> &'static str {
        match self {
            PulseError::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            PulseError::ModelTimeout { .. } => "MODEL_TIMEOUT",
            PulseError::ModelHttp { .. } => "MODEL_HTTP_ERROR",
            PulseError::Cancelled => "CANCELLED",
            PulseError::ModelTransport(_) => "MODEL_TRANSPORT_ERROR",
            PulseError::ResponseParse { .. } => "RESPONSE_PARSE_ERROR",
            PulseError::Persistence(_) => "PERSISTENCE_ERROR",
            PulseError::DispatchTimeout { .. } => "DISPATCH_TIMEOUT",
            PulseError::Store(_) => "STORE_ERROR",
            PulseError::InvalidRequest(_) => "INVALID_REQUEST",
            PulseError::Config(_) => "CONFIG_ERROR",
            PulseError::BatchFailed { .. } => "BATCH_FAILED",
            PulseError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PulseError::ModelTimeout { .. } | PulseError::DispatchTimeout { .. }
        )
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, PulseError::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_failure_message_lists_each_rubric() {
        let err = PulseError::BatchFailed {
            attempted: 2,
            failures: vec![
                RubricFailure {
                    insight_type: InsightType::Security,
                    code: "MODEL_TIMEOUT",
                    message: "Model call timed out after 25000ms".into(),
                },
                RubricFailure {
                    insight_type: InsightType::CodeQuality,
                    code: "DATA_UNAVAILABLE",
                    message: "no data".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("All 2 insight generations failed"));
        assert!(msg.contains("security=MODEL_TIMEOUT"));
        assert!(msg.contains("code_quality=DATA_UNAVAILABLE"));
        assert_eq!(err.code(), "BATCH_FAILED");
    }

    #[test]
    fn only_invalid_requests_are_client_errors() {
        assert!(PulseError::InvalidRequest("x".into()).is_client_error());
        assert!(!PulseError::DispatchTimeout { elapsed_ms: 30_000 }.is_client_error());
        assert!(PulseError::DispatchTimeout { elapsed_ms: 1 }.is_timeout());
    }
}
