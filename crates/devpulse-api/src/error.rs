use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use devpulse_core::PulseError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Pulse(#[from] PulseError),

    #[error("Invalid request body: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Pulse(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pulse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Pulse(err) => err.code(),
            ApiError::BadRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Attach the time spent handling the request.
    pub fn after(self, elapsed: Duration) -> TimedError {
        TimedError {
            error: self,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Error carrying the elapsed handling time for the response body.
#[derive(Debug)]
pub struct TimedError {
    pub error: ApiError,
    pub duration_ms: u64,
}

impl IntoResponse for TimedError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let body = Json(json!({
            "error": self.error.to_string(),
            "code": self.error.code(),
            "duration_ms": self.duration_ms,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }));

        (status, body).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.after(Duration::ZERO).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
