//! Browser-facing routes mounted at the root.

use axum::routing::{get, get_service};
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::SitePaths;
use crate::handlers::pages;
use crate::state::AppState;

/// Pages, job files, and static directories.
///
/// ```text
/// GET    /                  -> templates/index.html
/// POST   /                  -> submit_form (303 to the job log)
/// GET    /status            -> templates/status.html
/// GET    /jobs/{id}/        -> job_index
/// GET    /jobs/{id}/{file}  -> job_file
/// GET    /assets/*          -> assets directory
/// GET    /playbooks/*       -> playbooks directory
/// ```
pub fn router(site: &SitePaths) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get_service(ServeFile::new(site.templates_dir.join("index.html")))
                .post(pages::submit_form),
        )
        .route_service(
            "/status",
            ServeFile::new(site.templates_dir.join("status.html")),
        )
        .route("/jobs/{id}", get(pages::job_index))
        .route("/jobs/{id}/", get(pages::job_index))
        .route("/jobs/{id}/{file}", get(pages::job_file))
        .nest_service("/assets", ServeDir::new(&site.assets_dir))
        .nest_service("/playbooks", ServeDir::new(&site.playbooks_dir))
}
