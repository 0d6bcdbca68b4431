use crate::{ApiError, ApiResult, AppState, TimedError};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use devpulse_core::Insight;
use devpulse_insights::{DispatchOutcome, InsightRequest};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{error, info};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct InsightListResponse {
    pub project_id: String,
    pub insights: Vec<Insight>,
    pub total: usize,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// CORS preflight for clients that send a bare `OPTIONS`.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Single entry point for insight generation.
///
/// The body is parsed here rather than through `Json` so malformed input
/// gets the same error envelope as every other failure.
pub async fn generate_insights(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, TimedError> {
    let started = Instant::now();

    let request: InsightRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(e.to_string()).after(started.elapsed()))?;
    let action = request.action.clone();

    match state.dispatcher.dispatch(request).await {
        Ok(DispatchOutcome::Single(data)) => {
            info!(action = %action, elapsed_ms = started.elapsed().as_millis() as u64, "Insight generated");
            Ok(Json(json!({ "insights": data })))
        }
        Ok(DispatchOutcome::Batch(summary)) => {
            info!(
                action = %action,
                generated = summary.generated,
                failed = summary.failed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Batch generated"
            );
            Ok(Json(json!({ "results": summary })))
        }
        Err(e) => {
            error!(action = %action, code = e.code(), error = %e, "Insight request failed");
            Err(ApiError::from(e).after(started.elapsed()))
        }
    }
}

/// Unexpired insights for a project, newest first.
pub async fn list_project_insights(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<InsightListResponse>> {
    let insights = state.insights.active_insights(&project_id, Utc::now()).await?;
    Ok(Json(InsightListResponse {
        total: insights.len(),
        project_id,
        insights,
    }))
}
