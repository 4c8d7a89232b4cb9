//! HTTP API server
//!
//! This module provides the external surface of the service:
//! - POST /api/process - Transcribe an upload or URL and build insights
//! - POST /api/finalize - Finish a client-side session (transcript + optional audio tail)
//! - GET /jobs/:job_id - Query a queued job
//! - GET /ws - Live streaming transcription channel
//! - GET /health - Health check (unauthenticated)

mod auth;
mod handlers;
mod routes;
mod state;
mod ws;

pub use routes::create_router;
pub use state::AppState;
