use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use ansiweb_core::catalog::Catalog;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/catalog
///
/// Machines, playbooks, and roles available to the submission form. Missing
/// sources produce empty lists.
pub async fn get_catalog(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let site = &state.config.site;
    let catalog = Catalog::load(
        &site.machines_file,
        &site.playbooks_dir,
        &state.config.jobs.roles_dir,
    )
    .await;

    Ok(Json(DataResponse { data: catalog }))
}
