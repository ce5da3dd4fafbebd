pub mod catalog;
pub mod health;
pub mod jobs;
pub mod pages;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                    list, submit
/// /jobs/{id}               status summary
/// /jobs/{id}/cancel        cancel (POST)
///
/// /catalog                 machines, playbooks, roles
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/catalog", catalog::router())
}
