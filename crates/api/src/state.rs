use std::sync::Arc;

use ansiweb_core::jobs::JobRunner;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (paths for catalogs and static pages).
    pub config: Arc<ServerConfig>,
    /// Job submission, supervision, and registry.
    pub jobs: Arc<JobRunner>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let jobs = Arc::new(JobRunner::new(&config.jobs));
        Self {
            config: Arc::new(config),
            jobs,
        }
    }
}
