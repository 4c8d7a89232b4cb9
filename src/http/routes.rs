use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::state::AppState;
use super::{auth, handlers, ws};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Everything that submits or queries work requires the bearer secret.
    let protected = Router::new()
        .route("/api/process", post(handlers::process_audio))
        .route("/api/finalize", post(handlers::finalize_audio))
        .route("/jobs/:job_id", get(handlers::job_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        // Health check for orchestration tooling, no auth
        .route("/health", get(handlers::health_check))
        // Live channel; credential checked at upgrade time
        .route("/ws", get(ws::ws_upgrade))
        .merge(protected)
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
