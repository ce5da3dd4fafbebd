//! Process supervision.
//!
//! [`Supervisor::launch`] starts the automation engine for an allocated
//! workspace and returns as soon as the process exists. Waiting for the
//! process happens in a tracked background task per job, which is also the
//! only place that records the job's terminal status.
//!
//! Every launched job keeps a [`JobHandle`] in the supervisor's table for
//! the lifetime of the process, so running jobs can be cancelled, awaited,
//! or counted without touching the filesystem.
//!
//! The engine runs as the leader of its own process group. When it exits,
//! is cancelled, or times out, the whole group is killed and drained before
//! the status is recorded, so nothing it started can write to the log
//! afterwards.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::config::{EngineConfig, JobsConfig, UNBUFFERED_ENV};
use super::error::JobError;
use super::id::JobId;
use super::status::{self, JobStatus, RunOutcome, TerminalRecord};
use super::workspace::{AllocatedJob, Workspace};
use crate::error::CoreError;
use crate::types::Timestamp;

/// How long to wait for a killed process group to disappear.
const GROUP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
const GROUP_DRAIN_POLL: Duration = Duration::from_millis(10);

/// In-memory view of one launched job.
#[derive(Debug)]
pub struct JobHandle {
    pub started_at: Timestamp,
    cancel: CancellationToken,
    lifecycle: Arc<Mutex<Lifecycle>>,
    status: watch::Receiver<JobStatus>,
}

/// Shared between a job's handle and its supervision task so that an
/// accepted cancellation and the recorded outcome always agree.
#[derive(Debug, Default)]
struct Lifecycle {
    /// The engine has been reaped; cancelling is no longer possible.
    exited: bool,
    cancel_requested: bool,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }
}

/// A reserved slot for one running job.
///
/// Held by the supervision task and released once the terminal status has
/// been recorded.
#[derive(Debug)]
pub struct AdmissionPermit(Option<OwnedSemaphorePermit>);

/// Launches engine processes and owns their supervision tasks.
#[derive(Debug)]
pub struct Supervisor {
    base_dir: PathBuf,
    engine: EngineConfig,
    job_timeout: Option<Duration>,
    admission: Option<Arc<Semaphore>>,
    max_concurrent_jobs: usize,
    handles: RwLock<HashMap<JobId, JobHandle>>,
    tasks: TaskTracker,
}

impl Supervisor {
    pub fn new(config: &JobsConfig) -> Self {
        let admission = (config.max_concurrent_jobs > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent_jobs)));

        Self {
            base_dir: config.base_dir.clone(),
            engine: config.engine.clone(),
            job_timeout: config.job_timeout,
            admission,
            max_concurrent_jobs: config.max_concurrent_jobs,
            handles: RwLock::new(HashMap::new()),
            tasks: TaskTracker::new(),
        }
    }

    /// Reserve a slot for a new job, failing fast when all are taken.
    pub fn admit(&self) -> Result<AdmissionPermit, JobError> {
        let Some(semaphore) = &self.admission else {
            return Ok(AdmissionPermit(None));
        };

        Arc::clone(semaphore)
            .try_acquire_owned()
            .map(|permit| AdmissionPermit(Some(permit)))
            .map_err(|_| JobError::AtCapacity {
                limit: self.max_concurrent_jobs,
            })
    }

    /// Start the engine for `job` and hand it to a supervision task.
    ///
    /// Returns once the process has been created. A spawn failure is
    /// returned directly and leaves no terminal status behind.
    pub async fn launch(
        &self,
        job: AllocatedJob,
        permit: AdmissionPermit,
    ) -> Result<(), JobError> {
        let AllocatedJob { workspace, log } = job;
        let id = workspace.id().clone();

        let stderr = log
            .try_clone()
            .map_err(|e| JobError::workspace(workspace.log_path(), e))?;

        let mut cmd = self.engine_command(&workspace);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr));

        let child = cmd.spawn().map_err(|source| JobError::Launch {
            program: self.engine.program_name(),
            source,
        })?;
        // The child holds its own copies of the log descriptor.
        drop(cmd);

        let (status_tx, status_rx) = watch::channel(JobStatus::Running);
        let cancel = CancellationToken::new();
        let lifecycle = Arc::new(Mutex::new(Lifecycle::default()));

        self.handles.write().await.insert(
            id.clone(),
            JobHandle {
                started_at: chrono::Utc::now(),
                cancel: cancel.clone(),
                lifecycle: Arc::clone(&lifecycle),
                status: status_rx,
            },
        );

        tracing::info!(job_id = %id, pid = child.id(), "Job started");

        self.tasks.spawn(supervise(
            workspace,
            child,
            cancel,
            lifecycle,
            self.job_timeout,
            status_tx,
            permit,
        ));

        Ok(())
    }

    fn engine_command(&self, workspace: &Workspace) -> Command {
        let mut cmd = Command::new(&self.engine.program);
        cmd.args(&self.engine.leading_args)
            .arg("-i")
            .arg(workspace.inventory_path())
            .arg(workspace.playbook_path())
            .current_dir(&self.base_dir)
            .env(UNBUFFERED_ENV.0, UNBUFFERED_ENV.1)
            .process_group(0);

        for (key, value) in &self.engine.env_vars {
            cmd.env(key, value);
        }
        cmd
    }

    /// Request termination of a running job.
    ///
    /// The supervision task kills the process group and records the job as
    /// cancelled. Once accepted, the cancellation is what gets recorded even
    /// if the engine happened to exit on its own at the same moment. Fails
    /// with a conflict once the engine has been reaped.
    pub async fn cancel(&self, id: &JobId) -> Result<(), CoreError> {
        let handles = self.handles.read().await;
        let handle = handles.get(id).ok_or_else(|| CoreError::NotFound {
            entity: "Running job",
            id: id.to_string(),
        })?;

        let mut lifecycle = handle.lifecycle.lock().await;
        if lifecycle.exited {
            return Err(CoreError::Conflict(format!("Job {id} has already finished")));
        }
        lifecycle.cancel_requested = true;

        tracing::info!(job_id = %id, "Cancelling job");
        handle.cancel.cancel();
        Ok(())
    }

    /// Wait until `id` has a recorded terminal status.
    ///
    /// Returns `None` for jobs this supervisor never launched.
    pub async fn wait(&self, id: &JobId) -> Option<JobStatus> {
        let mut rx = self.handles.read().await.get(id)?.status.clone();
        let finished = rx
            .wait_for(|status| status.is_terminal())
            .await
            .map(|status| *status)
            .ok();
        // The task went away without publishing; report what it left.
        Some(finished.unwrap_or_else(|| *rx.borrow()))
    }

    /// Current in-memory status of a job launched by this supervisor.
    pub async fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.handles.read().await.get(id).map(JobHandle::status)
    }

    pub async fn running_count(&self) -> usize {
        self.handles
            .read()
            .await
            .values()
            .filter(|handle| !handle.status().is_terminal())
            .count()
    }

    /// Cancel every running job and wait for all supervision tasks to finish.
    pub async fn shutdown(&self) {
        for handle in self.handles.read().await.values() {
            handle.cancel.cancel();
        }
        self.tasks.close();
        self.tasks.wait().await;
    }
}

async fn supervise(
    workspace: Workspace,
    mut child: Child,
    cancel: CancellationToken,
    lifecycle: Arc<Mutex<Lifecycle>>,
    timeout: Option<Duration>,
    status_tx: watch::Sender<JobStatus>,
    _permit: AdmissionPermit,
) {
    let id = workspace.id().clone();
    let mut outcome = wait_for_exit(&mut child, &cancel, timeout).await;

    {
        let mut lifecycle = lifecycle.lock().await;
        lifecycle.exited = true;
        if lifecycle.cancel_requested && matches!(outcome, RunOutcome::Exited(_)) {
            outcome = RunOutcome::Cancelled;
        }
    }

    let status = match status::record(&workspace, &outcome).await {
        Ok(record) => {
            tracing::info!(
                job_id = %id,
                status = %record.status,
                exit_code = ?record.exit_code,
                detail = %record.detail,
                "Job finished",
            );
            record.status
        }
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "Failed to record terminal status");
            TerminalRecord::from_outcome(&outcome).status
        }
    };

    status_tx.send_replace(status);
}

/// Wait for `child` to exit, killing it on cancellation or timeout.
///
/// Only returns once the engine has been reaped and its process group is
/// gone (or [`GROUP_DRAIN_TIMEOUT`] has passed).
async fn wait_for_exit(
    child: &mut Child,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> RunOutcome {
    let pgid = child.id();
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        result = child.wait() => match result {
            Ok(exit) => RunOutcome::Exited(exit),
            Err(e) => RunOutcome::WaitFailed(e),
        },
        () = cancel.cancelled() => RunOutcome::Cancelled,
        () = deadline => RunOutcome::TimedOut,
    };
    let reaped = matches!(outcome, RunOutcome::Exited(_) | RunOutcome::WaitFailed(_));

    // Descendants share the engine's log; none may outlive it.
    let group_killed = match pgid {
        Some(pgid) => kill_process_group(pgid),
        None => false,
    };

    if !reaped {
        if !group_killed {
            if let Err(e) = child.kill().await {
                tracing::warn!(pid = child.id(), error = %e, "Failed to kill job process");
            }
        }
        if let Err(e) = child.wait().await {
            return RunOutcome::WaitFailed(e);
        }
    }

    if let Some(pgid) = pgid {
        drain_process_group(pgid).await;
    }
    outcome
}

/// SIGKILL every process in the group led by `pgid`. Returns `true` if the
/// group is known to be dead or gone.
fn kill_process_group(pgid: u32) -> bool {
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => true,
        Err(e) => {
            tracing::warn!(pgid, error = %e, "Failed to kill job process group");
            false
        }
    }
}

/// Wait until no process in the group led by `pgid` is left.
async fn drain_process_group(pgid: u32) {
    let drained = tokio::time::timeout(GROUP_DRAIN_TIMEOUT, async {
        loop {
            match killpg(Pid::from_raw(pgid as i32), None) {
                Err(Errno::ESRCH) => return,
                Ok(()) => tokio::time::sleep(GROUP_DRAIN_POLL).await,
                Err(e) => {
                    tracing::warn!(pgid, error = %e, "Cannot probe job process group");
                    return;
                }
            }
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(pgid, "Job process group still present after kill");
    }
}
