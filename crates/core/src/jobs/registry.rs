//! Read path over existing job workspaces.
//!
//! The registry never writes to a workspace except in
//! [`JobRegistry::reconcile_orphans`], which runs once at startup before any
//! job can have been launched by this process.

use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;

use super::id::JobId;
use super::status::{self, JobStatus, RunOutcome, TerminalRecord};
use super::workspace::Workspace;
use crate::error::CoreError;

/// What to do at startup with workspaces that have no terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Record them as failed: nothing is supervising them anymore.
    #[default]
    Fail,
    /// Leave them without a status, so they keep reading as running.
    Keep,
}

impl std::str::FromStr for OrphanPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "keep" => Ok(Self::Keep),
            other => Err(CoreError::Validation(format!(
                "Unknown orphan policy '{other}' (expected 'fail' or 'keep')"
            ))),
        }
    }
}

/// Everything a consumer may want to know about one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job: JobId,
    pub status: JobStatus,
    /// Current size of the log in bytes.
    pub log_bytes: u64,
    pub terminal: Option<TerminalRecord>,
}

/// Enumerates and resolves job workspaces under the jobs root.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    jobs_dir: PathBuf,
}

impl JobRegistry {
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
        }
    }

    /// All job ids, sorted lexicographically.
    ///
    /// A jobs root that does not exist yet simply has no jobs. Workspaces
    /// created while the scan runs may or may not be included.
    pub async fn list_jobs(&self) -> Result<Vec<JobId>, CoreError> {
        let mut entries = match tokio::fs::read_dir(&self.jobs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.io_error(e))? {
            let is_dir = match entry.file_type().await {
                Ok(file_type) => file_type.is_dir(),
                // Removed between listing and stat.
                Err(_) => false,
            };
            if !is_dir {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Ok(id) = JobId::parse(&name) {
                jobs.push(id);
            }
        }

        jobs.sort();
        Ok(jobs)
    }

    /// Map an externally supplied id to its workspace.
    pub async fn resolve(&self, raw: &str) -> Result<Workspace, CoreError> {
        let not_found = || CoreError::NotFound {
            entity: "Job",
            id: raw.to_string(),
        };

        let id = JobId::parse(raw).map_err(|_| not_found())?;
        let workspace = Workspace::at(&self.jobs_dir, id);

        match tokio::fs::symlink_metadata(workspace.dir()).await {
            Ok(meta) if meta.is_dir() => Ok(workspace),
            Ok(_) => Err(not_found()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Status derived from the workspace's terminal-status artifact.
    pub async fn status(&self, workspace: &Workspace) -> Result<JobStatus, CoreError> {
        Ok(status::read(workspace)
            .await
            .map_err(|e| self.io_error(e))?
            .map_or(JobStatus::Running, |record| record.status))
    }

    pub async fn describe(&self, raw: &str) -> Result<JobSummary, CoreError> {
        let workspace = self.resolve(raw).await?;
        let terminal = status::read(&workspace)
            .await
            .map_err(|e| self.io_error(e))?;
        let log_bytes = tokio::fs::metadata(workspace.log_path())
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);

        Ok(JobSummary {
            job: workspace.id().clone(),
            status: terminal
                .as_ref()
                .map_or(JobStatus::Running, |record| record.status),
            log_bytes,
            terminal,
        })
    }

    /// Deal with workspaces left without a terminal status by an earlier
    /// process. Returns the ids that were marked failed.
    ///
    /// Must run before this process launches any job.
    pub async fn reconcile_orphans(
        &self,
        policy: OrphanPolicy,
    ) -> Result<Vec<JobId>, CoreError> {
        let mut orphans = Vec::new();
        for id in self.list_jobs().await? {
            let workspace = Workspace::at(&self.jobs_dir, id);
            if self.status(&workspace).await? != JobStatus::Running {
                continue;
            }

            match policy {
                OrphanPolicy::Keep => {
                    tracing::warn!(
                        job_id = %workspace.id(),
                        "Job has no terminal status, leaving as is",
                    );
                }
                OrphanPolicy::Fail => {
                    match status::record(&workspace, &RunOutcome::Orphaned).await {
                        Ok(_) => {
                            tracing::warn!(
                                job_id = %workspace.id(),
                                "Marked orphaned job as failed",
                            );
                            orphans.push(workspace.id().clone());
                        }
                        Err(e) => {
                            tracing::error!(
                                job_id = %workspace.id(),
                                error = %e,
                                "Failed to mark orphaned job",
                            );
                        }
                    }
                }
            }
        }
        Ok(orphans)
    }

    fn io_error(&self, e: std::io::Error) -> CoreError {
        CoreError::Internal(format!(
            "Failed to read jobs directory {}: {e}",
            self.jobs_dir.display()
        ))
    }
}
