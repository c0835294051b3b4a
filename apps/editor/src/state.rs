use std::sync::Arc;

use crate::config::Config;
use crate::session::{DocumentStore, SessionRegistry};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Open editor sessions keyed by session id.
    pub sessions: Arc<SessionRegistry>,
    /// Pluggable document persistence. Default: InMemoryStore.
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let sessions = Arc::new(SessionRegistry::new(config.editor_settings()));
        Self {
            config,
            sessions,
            store,
        }
    }
}
