/// Errors surfaced by the read and control paths over jobs.
///
/// Submission failures have their own type, [`crate::jobs::JobError`], since
/// they carry filesystem and process detail that must not reach clients.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No job (or job file) answers to `id`. Malformed ids land here too,
    /// so callers cannot probe the jobs root with crafted names.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The job exists but is not in a state that allows the operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Reading the jobs root failed for a reason other than absence.
    #[error("Jobs storage error: {0}")]
    Internal(String),
}
