//! Handlers for the `/api/v1/jobs` resource.

use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use ansiweb_core::error::CoreError;
use ansiweb_core::jobs::{JobId, JobInputs};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extract::Submitter;
use crate::response::DataResponse;
use crate::state::AppState;

/// Label reported for submissions that did not name a catalog playbook.
pub const CUSTOM_PLAYBOOK_LABEL: &str = "custom";

/// Request body for submitting a job.
#[derive(Debug, Deserialize)]
pub struct SubmitJob {
    pub inventory: String,
    pub playbook: String,
    /// Catalog name the playbook text was taken from, for display only.
    #[serde(default)]
    pub playbook_selection: Option<String>,
}

/// One entry of the job listing.
#[derive(Debug, Serialize)]
pub struct JobLink {
    pub job: JobId,
    pub link: String,
}

/// Response body for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmittedJobResponse {
    pub job: JobId,
    pub playbook: String,
    /// URL path of the job's log, readable while the job runs.
    pub logfile: String,
    pub link: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// URL path of a job's log file.
pub fn log_url(id: &JobId) -> String {
    format!("/jobs/{id}/log")
}

/// Externally addressable link to a job's workspace listing.
///
/// Uses the request's `Host` header, falling back to the configured bind
/// address when the client sent none.
fn job_link(headers: &HeaderMap, state: &AppState, id: &JobId) -> String {
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            SocketAddr::new(state.config.host, state.config.port).to_string()
        });
    format!("http://{host}/jobs/{id}/")
}

/// Submit a job and build the response payload shared by the JSON and form
/// endpoints.
pub(crate) async fn submit(
    state: &AppState,
    headers: &HeaderMap,
    submitter: Submitter,
    input: SubmitJob,
) -> AppResult<SubmittedJobResponse> {
    let playbook = input
        .playbook_selection
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| CUSTOM_PLAYBOOK_LABEL.to_string());

    let submitted = state
        .jobs
        .submit(JobInputs {
            inventory: input.inventory,
            playbook: input.playbook,
            submitter: submitter.0.clone(),
        })
        .await?;

    tracing::info!(
        job_id = %submitted.id,
        playbook = %playbook,
        submitter = %submitter.0,
        "Job submitted",
    );

    Ok(SubmittedJobResponse {
        link: job_link(headers, state, &submitted.id),
        logfile: log_url(&submitted.id),
        job: submitted.id,
        playbook,
    })
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Allocate a workspace and start the engine. Returns 201 once the engine
/// is running; the log named in the response already exists.
pub async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    submitter: Submitter,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let job = submit(&state, &headers, submitter, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Every job workspace, oldest first, with a link to its listing.
pub async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let jobs: Vec<JobLink> = state
        .jobs
        .registry()
        .list_jobs()
        .await?
        .into_iter()
        .map(|job| JobLink {
            link: job_link(&headers, &state, &job),
            job,
        })
        .collect();

    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let summary = state.jobs.registry().describe(&job_id).await?;
    Ok(Json(DataResponse { data: summary }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Ask a running job to stop. Returns 202; the terminal status is recorded
/// by the job's supervising task once the engine has exited. Returns 409 if
/// this process is not running the job or the engine has already exited.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let workspace = state.jobs.registry().resolve(&job_id).await?;
    let id = workspace.id();

    match state.jobs.supervisor().cancel(id).await {
        Ok(()) => {}
        Err(CoreError::NotFound { .. }) => {
            return Err(CoreError::Conflict(format!("Job {id} is not running")).into());
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(job_id = %id, "Job cancellation requested");

    Ok(StatusCode::ACCEPTED)
}
