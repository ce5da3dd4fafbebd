//! Handlers behind the browser-facing pages: form submission and the
//! per-job file listing under `/jobs`.

use axum::extract::{Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use ansiweb_core::error::CoreError;
use ansiweb_core::jobs::workspace::{
    INVENTORY_FILE, LOG_FILE, PLAYBOOK_FILE, STATUS_FILE, SUBMITTER_FILE,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::AppResult;
use crate::extract::Submitter;
use crate::handlers::jobs::{self, SubmitJob};
use crate::state::AppState;

/// Workspace files exposed over HTTP. The roles link is deliberately absent.
pub const PUBLISHED_FILES: [&str; 5] = [
    LOG_FILE,
    STATUS_FILE,
    INVENTORY_FILE,
    PLAYBOOK_FILE,
    SUBMITTER_FILE,
];

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// POST /
///
/// Form counterpart of `POST /api/v1/jobs`. Redirects (303) to the job's
/// log so the browser starts following it immediately.
pub async fn submit_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    submitter: Submitter,
    Form(input): Form<SubmitJob>,
) -> AppResult<Redirect> {
    let job = jobs::submit(&state, &headers, submitter, input).await?;
    Ok(Redirect::to(&job.logfile))
}

/// GET /jobs/{id}/
///
/// Minimal index of the files a job workspace currently holds.
pub async fn job_index(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Html<String>> {
    let workspace = state.jobs.registry().resolve(&job_id).await?;
    let id = workspace.id();

    let mut items = String::new();
    for name in PUBLISHED_FILES {
        if tokio::fs::metadata(workspace.dir().join(name)).await.is_ok() {
            items.push_str(&format!(
                "<li><a href=\"/jobs/{id}/{name}\">{name}</a></li>\n"
            ));
        }
    }

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Job {id}</title></head>\n\
         <body>\n<h1>Job {id}</h1>\n<ul>\n{items}</ul>\n</body>\n</html>\n"
    )))
}

/// GET /jobs/{id}/{file}
///
/// Serves one workspace file as it currently is on disk. The log may still
/// be growing; clients can follow it with `Range` requests.
pub async fn job_file(
    State(state): State<AppState>,
    Path((job_id, name)): Path<(String, String)>,
    request: Request,
) -> AppResult<Response> {
    if !PUBLISHED_FILES.contains(&name.as_str()) {
        return Err(CoreError::NotFound {
            entity: "Job file",
            id: format!("{job_id}/{name}"),
        }
        .into());
    }
    let workspace = state.jobs.registry().resolve(&job_id).await?;

    let mut response = match ServeFile::new(workspace.dir().join(&name))
        .oneshot(request)
        .await
    {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };

    if response.status().is_success() {
        let content_type = if name == STATUS_FILE {
            APPLICATION_JSON
        } else {
            TEXT_PLAIN
        };
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    Ok(response)
}
