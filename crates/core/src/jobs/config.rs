//! Filesystem and engine settings shared by the job components.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default program started for every job.
pub const DEFAULT_ENGINE_PROGRAM: &str = "ansible-playbook";

/// Default upper bound on concurrently running jobs.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 16;

/// Environment variable that disables output buffering in the engine.
///
/// `ansible-playbook` is a Python program; without this the log only fills
/// in large chunks and cannot be tailed while the job runs.
pub const UNBUFFERED_ENV: (&str, &str) = ("PYTHONUNBUFFERED", "1");

/// How the automation engine is invoked.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Program to execute (looked up on `PATH` if not absolute).
    pub program: OsString,
    /// Arguments placed before `-i <inventory> <playbook>`.
    pub leading_args: Vec<OsString>,
    /// Extra environment variables on top of the inherited environment.
    pub env_vars: Vec<(String, String)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_ENGINE_PROGRAM.into(),
            leading_args: Vec::new(),
            env_vars: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// Everything the job components need to know about their surroundings.
///
/// Passed explicitly to the allocator, supervisor, and registry so tests
/// can point them at a temporary directory.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Working directory of every engine run; relative role lookups resolve here.
    pub base_dir: PathBuf,
    /// Root under which one workspace directory per job is created.
    pub jobs_dir: PathBuf,
    /// Shared roles tree linked into every workspace.
    pub roles_dir: PathBuf,
    pub engine: EngineConfig,
    /// Concurrent job limit; `0` disables admission control.
    pub max_concurrent_jobs: usize,
    /// Wall-clock limit per job; `None` lets jobs run to completion.
    pub job_timeout: Option<Duration>,
}

impl JobsConfig {
    /// Conventional layout below `base_dir`: `jobs/` and `roles/`.
    pub fn under(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        Self {
            jobs_dir: base_dir.join("jobs"),
            roles_dir: base_dir.join("roles"),
            base_dir,
            engine: EngineConfig::default(),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            job_timeout: None,
        }
    }
}
