//! Terminal status of a job.
//!
//! The `exitstatus` artifact is written once, by the supervision task,
//! after the engine process has exited. Its absence means the job is
//! still running (or its supervisor was lost, see
//! [`reconcile_orphans`](super::registry::JobRegistry::reconcile_orphans)).

use std::io::ErrorKind;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};

use super::error::JobError;
use super::workspace::{write_new_file, Workspace, STATUS_FILE};
use crate::types::Timestamp;

/// The status artifact is readable by its owner only.
const STATUS_MODE: u32 = 0o400;

/// Externally visible state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a supervised run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The process exited on its own (or was killed by a signal).
    Exited(ExitStatus),
    /// The job was cancelled and the process killed.
    Cancelled,
    /// The job exceeded its runtime limit and the process was killed.
    TimedOut,
    /// Waiting on the process failed.
    WaitFailed(std::io::Error),
    /// No supervisor survived to observe the end of the run.
    Orphaned,
}

/// Contents of the terminal-status artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalRecord {
    pub status: JobStatus,
    /// Exit code of the engine, if it exited normally.
    pub exit_code: Option<i32>,
    pub detail: String,
    pub finished_at: Timestamp,
}

impl TerminalRecord {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let (status, exit_code, detail) = match outcome {
            RunOutcome::Exited(exit) if exit.success() => (
                JobStatus::Succeeded,
                exit.code(),
                "finished with no errors".to_string(),
            ),
            RunOutcome::Exited(exit) => (
                JobStatus::Failed,
                exit.code(),
                format!("finished with error status: {exit}"),
            ),
            RunOutcome::Cancelled => (JobStatus::Failed, None, "cancelled".to_string()),
            RunOutcome::TimedOut => (JobStatus::Failed, None, "timed out".to_string()),
            RunOutcome::WaitFailed(e) => (
                JobStatus::Failed,
                None,
                format!("lost track of process: {e}"),
            ),
            RunOutcome::Orphaned => (
                JobStatus::Failed,
                None,
                "supervision lost (host restarted)".to_string(),
            ),
        };

        Self {
            status,
            exit_code,
            detail,
            finished_at: chrono::Utc::now(),
        }
    }
}

/// Persist the terminal status of `workspace`'s job.
///
/// The record is written to a private file first and then hard-linked into
/// place, so readers never see a partially written artifact. Fails with
/// [`JobError::StatusExists`] if a status was already recorded; the
/// existing record is left untouched.
pub async fn record(
    workspace: &Workspace,
    outcome: &RunOutcome,
) -> Result<TerminalRecord, JobError> {
    let record = TerminalRecord::from_outcome(outcome);
    let mut contents = serde_json::to_vec_pretty(&record)?;
    contents.push(b'\n');

    let staged = workspace
        .dir()
        .join(format!(".{STATUS_FILE}.{}", uuid::Uuid::now_v7()));
    write_new_file(&staged, &contents, STATUS_MODE)
        .await
        .map_err(|e| JobError::workspace(&staged, e))?;

    let path = workspace.status_path();
    let linked = tokio::fs::hard_link(&staged, &path).await;
    if let Err(e) = tokio::fs::remove_file(&staged).await {
        tracing::warn!(path = %staged.display(), error = %e, "Failed to remove staged status");
    }
    linked.map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => JobError::StatusExists(workspace.id().clone()),
        _ => JobError::workspace(&path, e),
    })?;

    Ok(record)
}

/// Read the terminal record of `workspace`, if one was written.
///
/// An empty artifact reads as "still running". A record that has content
/// but cannot be parsed counts as a failure, so a damaged artifact never
/// reads as "still running" either.
pub async fn read(workspace: &Workspace) -> std::io::Result<Option<TerminalRecord>> {
    let path = workspace.status_path();
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let record = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Unreadable terminal status");
        TerminalRecord {
            status: JobStatus::Failed,
            exit_code: None,
            detail: String::from_utf8_lossy(&bytes).trim().to_string(),
            finished_at: chrono::Utc::now(),
        }
    });
    Ok(Some(record))
}
