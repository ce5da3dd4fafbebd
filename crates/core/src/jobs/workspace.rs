//! Workspace allocation.
//!
//! Every job gets its own directory under the jobs root holding its inputs,
//! a link to the shared roles tree, and the log the engine writes into.
//! All creation goes through exclusive primitives (`create_dir`,
//! `create_new`), never check-then-create, so concurrent submissions can
//! neither collide nor overwrite each other's files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::config::JobsConfig;
use super::error::JobError;
use super::id::JobId;

pub const INVENTORY_FILE: &str = "inventory";
pub const PLAYBOOK_FILE: &str = "playbook.yml";
pub const SUBMITTER_FILE: &str = "remote";
pub const LOG_FILE: &str = "log";
pub const STATUS_FILE: &str = "exitstatus";
pub const ROLES_LINK: &str = "roles";

/// Inputs and log are read-only once created.
const READ_ONLY_MODE: u32 = 0o444;

/// Fresh names are drawn this many times before giving up.
const MAX_NAME_ATTEMPTS: u32 = 8;

/// What a submitter hands over for one run.
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub inventory: String,
    pub playbook: String,
    /// Free-text provenance, typically the client address.
    pub submitter: String,
}

/// Paths of one job's workspace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    id: JobId,
    dir: PathBuf,
}

impl Workspace {
    pub fn at(jobs_dir: &Path, id: JobId) -> Self {
        let dir = jobs_dir.join(id.as_str());
        Self { id, dir }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.dir.join(INVENTORY_FILE)
    }

    pub fn playbook_path(&self) -> PathBuf {
        self.dir.join(PLAYBOOK_FILE)
    }

    pub fn submitter_path(&self) -> PathBuf {
        self.dir.join(SUBMITTER_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    pub fn roles_path(&self) -> PathBuf {
        self.dir.join(ROLES_LINK)
    }
}

/// A populated workspace together with the open log handle for the engine.
#[derive(Debug)]
pub struct AllocatedJob {
    pub workspace: Workspace,
    pub log: std::fs::File,
}

/// Creates and populates job workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceAllocator {
    jobs_dir: PathBuf,
    roles_dir: PathBuf,
}

impl WorkspaceAllocator {
    pub fn new(config: &JobsConfig) -> Self {
        // Workspace paths are handed to an engine running in the base
        // directory, and the roles link target is resolved from inside the
        // workspace; neither may stay relative to our own cwd.
        Self {
            jobs_dir: absolute(&config.jobs_dir),
            roles_dir: absolute(&config.roles_dir),
        }
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    /// Create a new workspace for `inputs` and open its log.
    ///
    /// On any failure after the directory exists, the directory is removed
    /// again so the registry never lists a half-written job.
    pub async fn allocate(&self, inputs: &JobInputs) -> Result<AllocatedJob, JobError> {
        tokio::fs::create_dir_all(&self.jobs_dir)
            .await
            .map_err(|e| JobError::workspace(&self.jobs_dir, e))?;

        let workspace = self.create_workspace_dir().await?;

        match self.populate(&workspace, inputs).await {
            Ok(log) => {
                tracing::debug!(
                    job_id = %workspace.id(),
                    dir = %workspace.dir().display(),
                    "Workspace allocated",
                );
                Ok(AllocatedJob { workspace, log })
            }
            Err(e) => {
                discard(&workspace).await;
                Err(e)
            }
        }
    }

    async fn create_workspace_dir(&self) -> Result<Workspace, JobError> {
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let workspace = Workspace::at(&self.jobs_dir, JobId::generate());
            match tokio::fs::create_dir(workspace.dir()).await {
                Ok(()) => return Ok(workspace),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!(
                        job_id = %workspace.id(),
                        attempt,
                        "Workspace name already taken, drawing another",
                    );
                }
                Err(e) => return Err(JobError::workspace(workspace.dir(), e)),
            }
        }

        Err(JobError::NameExhausted {
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    async fn populate(
        &self,
        workspace: &Workspace,
        inputs: &JobInputs,
    ) -> Result<std::fs::File, JobError> {
        write_once(&workspace.inventory_path(), inputs.inventory.as_bytes()).await?;
        write_once(&workspace.playbook_path(), inputs.playbook.as_bytes()).await?;

        let note = format!("job started by {}", inputs.submitter);
        if let Err(e) = write_once(&workspace.submitter_path(), note.as_bytes()).await {
            tracing::warn!(job_id = %workspace.id(), error = %e, "Failed to record submitter");
        }

        tokio::fs::symlink(&self.roles_dir, workspace.roles_path())
            .await
            .map_err(|e| JobError::workspace(workspace.roles_path(), e))?;

        create_log(workspace).await
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Write `contents` to a file that must not exist yet.
pub(crate) async fn write_once(path: &Path, contents: &[u8]) -> Result<(), JobError> {
    write_new_file(path, contents, READ_ONLY_MODE)
        .await
        .map_err(|e| JobError::workspace(path, e))
}

pub(crate) async fn write_new_file(
    path: &Path,
    contents: &[u8],
    mode: u32,
) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

async fn create_log(workspace: &Workspace) -> Result<std::fs::File, JobError> {
    let path = workspace.log_path();
    let file = OpenOptions::new()
        .append(true)
        .create_new(true)
        .mode(READ_ONLY_MODE)
        .open(&path)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => JobError::LogExists(path.clone()),
            _ => JobError::workspace(&path, e),
        })?;
    Ok(file.into_std().await)
}

async fn discard(workspace: &Workspace) {
    if let Err(e) = tokio::fs::remove_dir_all(workspace.dir()).await {
        tracing::warn!(
            job_id = %workspace.id(),
            error = %e,
            "Failed to remove incomplete workspace",
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::os::unix::fs::PermissionsExt;

    use assert_matches::assert_matches;

    use super::*;
    use crate::jobs::test_helpers::{sample_inputs, test_config};

    #[tokio::test]
    async fn allocate_persists_inputs_and_creates_empty_log() {
        let root = tempfile::tempdir().expect("tempdir");
        let allocator = WorkspaceAllocator::new(&test_config(root.path()));

        let job = allocator.allocate(&sample_inputs()).await.expect("allocate");
        let ws = &job.workspace;

        assert_eq!(
            std::fs::read_to_string(ws.inventory_path()).expect("inventory"),
            "[web]\nhost1"
        );
        assert_eq!(
            std::fs::read_to_string(ws.playbook_path()).expect("playbook"),
            "- hosts: web\n  tasks: []"
        );
        assert_eq!(
            std::fs::read_to_string(ws.submitter_path()).expect("remote"),
            "job started by 127.0.0.1:5555"
        );
        assert_eq!(std::fs::metadata(ws.log_path()).expect("log").len(), 0);
        assert!(!ws.status_path().exists());
    }

    #[tokio::test]
    async fn allocate_creates_missing_jobs_root() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = test_config(root.path());
        assert!(!config.jobs_dir.exists());

        WorkspaceAllocator::new(&config)
            .allocate(&sample_inputs())
            .await
            .expect("allocate");
        assert!(config.jobs_dir.is_dir());
    }

    #[tokio::test]
    async fn inputs_are_read_only() {
        let root = tempfile::tempdir().expect("tempdir");
        let job = WorkspaceAllocator::new(&test_config(root.path()))
            .allocate(&sample_inputs())
            .await
            .expect("allocate");

        for path in [job.workspace.inventory_path(), job.workspace.playbook_path()] {
            let mode = std::fs::metadata(&path).expect("meta").permissions().mode();
            assert_eq!(mode & 0o777, 0o444, "{} should be read-only", path.display());
        }
    }

    #[tokio::test]
    async fn roles_link_points_at_shared_tree() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = test_config(root.path());
        std::fs::create_dir_all(config.roles_dir.join("common")).expect("roles");

        let job = WorkspaceAllocator::new(&config)
            .allocate(&sample_inputs())
            .await
            .expect("allocate");

        let link = job.workspace.roles_path();
        assert!(std::fs::symlink_metadata(&link)
            .expect("link meta")
            .file_type()
            .is_symlink());
        assert!(link.join("common").is_dir());
    }

    #[tokio::test]
    async fn write_once_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("inventory");
        write_once(&path, b"first").await.expect("first write");

        let err = write_once(&path, b"second").await.expect_err("second write");
        assert_matches!(err, JobError::Workspace { ref source, .. } if source.kind() == ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "first");
    }

    #[tokio::test]
    async fn concurrent_allocations_get_distinct_workspaces() {
        let root = tempfile::tempdir().expect("tempdir");
        let allocator = WorkspaceAllocator::new(&test_config(root.path()));

        let allocations = (0..32).map(|_| {
            let allocator = allocator.clone();
            tokio::spawn(async move { allocator.allocate(&sample_inputs()).await })
        });
        let results = futures::future::join_all(allocations).await;

        let mut ids = HashSet::new();
        let mut logs = HashSet::new();
        for result in results {
            let job = result.expect("join").expect("allocate");
            logs.insert(job.workspace.log_path());
            ids.insert(job.workspace.id().clone());
        }
        assert_eq!(ids.len(), 32);
        assert_eq!(logs.len(), 32);
    }

    #[tokio::test]
    async fn failed_allocation_leaves_no_workspace() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = test_config(root.path());
        std::fs::create_dir_all(&config.jobs_dir).expect("jobs dir");
        let allocator = WorkspaceAllocator::new(&config);

        // Occupy the roles link name up front so linking fails mid-populate.
        let workspace = allocator.create_workspace_dir().await.expect("dir");
        std::fs::write(workspace.roles_path(), b"not a link").expect("squat");
        let err = allocator
            .populate(&workspace, &sample_inputs())
            .await
            .expect_err("populate must fail");
        assert_matches!(err, JobError::Workspace { .. });

        discard(&workspace).await;
        assert!(!workspace.dir().exists());
    }
}
