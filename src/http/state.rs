use std::sync::Arc;

use crate::dispatch::WorkDispatcher;
use crate::queue::JobQueue;
use crate::session::SessionRegistry;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Strategy selected at startup: inline execution or queue submission
    pub dispatcher: Arc<dyn WorkDispatcher>,

    /// Present only in queued mode; job queries 404 without it
    pub queue: Option<Arc<JobQueue>>,

    /// Live streaming sessions
    pub registry: Arc<SessionRegistry>,

    /// Shared secret for all submission/query surfaces (None = open, dev only)
    pub bearer_token: Option<String>,
}
