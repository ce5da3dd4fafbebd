//! Job execution: workspace allocation, engine supervision, terminal
//! status recording, and the registry read path.
//!
//! Layout of one job on disk:
//!
//! ```text
//! <jobs_dir>/<job id>/
//!     inventory       submitted inventory (read-only)
//!     playbook.yml    submitted playbook (read-only)
//!     remote          "job started by <submitter>" (best-effort)
//!     roles ->        link to the shared roles tree
//!     log             engine stdout + stderr
//!     exitstatus      terminal status, JSON, written once after exit
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod registry;
pub mod runner;
pub mod status;
pub mod supervisor;
pub mod workspace;

pub use config::{EngineConfig, JobsConfig};
pub use error::JobError;
pub use id::JobId;
pub use registry::{JobRegistry, JobSummary, OrphanPolicy};
pub use runner::{JobRunner, SubmittedJob};
pub use status::{JobStatus, TerminalRecord};
pub use supervisor::Supervisor;
pub use workspace::{JobInputs, Workspace};
