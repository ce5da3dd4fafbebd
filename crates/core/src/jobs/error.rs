//! Errors raised while allocating, launching, or finalizing a job.

use std::path::PathBuf;

use super::id::JobId;

/// Errors that can occur on the submission path or when recording status.
///
/// Everything except [`JobError::StatusExists`] is returned to the
/// submitter before a response is sent. Failures after launch never come
/// back through this type; they are recorded as job status instead.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Creating or writing a workspace artifact failed.
    #[error("workspace I/O failed at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every drawn workspace name already existed.
    #[error("could not find a free workspace name after {attempts} attempts")]
    NameExhausted { attempts: u32 },

    /// The log file of a fresh workspace already existed.
    #[error("log file already exists at {0}")]
    LogExists(PathBuf),

    /// The automation engine could not be started.
    #[error("failed to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// No admission slot was free for another concurrent job.
    #[error("too many running jobs (limit {limit})")]
    AtCapacity { limit: usize },

    /// The terminal status of a job was written twice.
    #[error("terminal status already recorded for job {0}")]
    StatusExists(JobId),

    /// The terminal status could not be serialized.
    #[error("failed to encode terminal status: {0}")]
    Encode(#[from] serde_json::Error),
}

impl JobError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }
}
