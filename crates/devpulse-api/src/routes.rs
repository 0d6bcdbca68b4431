use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))

        // Insight generation
        .route(
            "/generate-insights",
            post(handlers::generate_insights).options(handlers::preflight),
        )

        // Read path
        .route(
            "/projects/{project_id}/insights",
            get(handlers::list_project_insights),
        )

        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}
