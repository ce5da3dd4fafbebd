//! Submission entry point tying allocation and supervision together.

use std::path::PathBuf;

use super::config::JobsConfig;
use super::error::JobError;
use super::id::JobId;
use super::registry::JobRegistry;
use super::supervisor::Supervisor;
use super::workspace::{JobInputs, WorkspaceAllocator};

/// Handle returned to a submitter as soon as the engine has started.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub id: JobId,
    /// Absolute path of the job's log, which exists at this point.
    pub log_path: PathBuf,
}

/// Accepts submissions and exposes the supervisor and registry behind them.
#[derive(Debug)]
pub struct JobRunner {
    allocator: WorkspaceAllocator,
    supervisor: Supervisor,
    registry: JobRegistry,
}

impl JobRunner {
    pub fn new(config: &JobsConfig) -> Self {
        let allocator = WorkspaceAllocator::new(config);
        let registry = JobRegistry::new(allocator.jobs_dir());
        Self {
            allocator,
            supervisor: Supervisor::new(config),
            registry,
        }
    }

    /// Allocate a workspace for `inputs` and start the engine on it.
    ///
    /// An admission slot is reserved first, so a full supervisor rejects the
    /// submission without creating anything on disk.
    pub async fn submit(&self, inputs: JobInputs) -> Result<SubmittedJob, JobError> {
        let permit = self.supervisor.admit()?;
        let job = self.allocator.allocate(&inputs).await?;

        let id = job.workspace.id().clone();
        let log_path = job.workspace.log_path();

        if let Err(e) = self.supervisor.launch(job, permit).await {
            tracing::error!(job_id = %id, error = %e, "Job failed to start");
            return Err(e);
        }

        Ok(SubmittedJob { id, log_path })
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}
