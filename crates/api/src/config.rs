use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ansiweb_core::jobs::config::{DEFAULT_ENGINE_PROGRAM, DEFAULT_MAX_CONCURRENT_JOBS};
use ansiweb_core::jobs::{EngineConfig, JobsConfig, OrphanPolicy};
use axum::http::HeaderValue;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

/// Files and directories the front end serves or reads from.
#[derive(Debug, Clone)]
pub struct SitePaths {
    /// Static pages: `index.html` (submission form) and `status.html`.
    pub templates_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub playbooks_dir: PathBuf,
    /// One machine name per line.
    pub machines_file: PathBuf,
}

impl SitePaths {
    /// Conventional layout below `base_dir`.
    pub fn under(base_dir: &Path) -> Self {
        Self {
            templates_dir: base_dir.join("templates"),
            assets_dir: base_dir.join("assets"),
            playbooks_dir: base_dir.join("playbooks"),
            machines_file: base_dir.join("machines"),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running from a checkout that
/// contains `jobs/`, `roles/`, `playbooks/`, `templates/`, and `assets/`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for cancelled jobs to finish (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub site: SitePaths,
    pub jobs: JobsConfig,
    pub orphan_policy: OrphanPolicy,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default              |
    /// |-------------------------|----------------------|
    /// | `HOST`                  | `0.0.0.0`            |
    /// | `PORT`                  | `8080`               |
    /// | `CORS_ORIGINS`          | (none)               |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                 |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                 |
    /// | `BASE_DIR`              | current directory    |
    /// | `JOBS_DIR`              | `<base>/jobs`        |
    /// | `ROLES_DIR`             | `<base>/roles`       |
    /// | `PLAYBOOKS_DIR`         | `<base>/playbooks`   |
    /// | `MACHINES_FILE`         | `<base>/machines`    |
    /// | `ASSETS_DIR`            | `<base>/assets`      |
    /// | `TEMPLATES_DIR`         | `<base>/templates`   |
    /// | `ENGINE_PROGRAM`        | `ansible-playbook`   |
    /// | `MAX_CONCURRENT_JOBS`   | `16` (`0` = no limit)|
    /// | `JOB_TIMEOUT_SECS`      | (no limit)           |
    /// | `ORPHAN_POLICY`         | `fail`               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "PORT", 8080)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|e| ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request_timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs = parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30)?;

        let base_dir = match lookup("BASE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().map_err(ConfigError::CurrentDir)?,
        };
        let path_or = |var: &str, default: PathBuf| {
            lookup(var).map(PathBuf::from).unwrap_or(default)
        };

        let defaults = SitePaths::under(&base_dir);
        let site = SitePaths {
            templates_dir: path_or("TEMPLATES_DIR", defaults.templates_dir),
            assets_dir: path_or("ASSETS_DIR", defaults.assets_dir),
            playbooks_dir: path_or("PLAYBOOKS_DIR", defaults.playbooks_dir),
            machines_file: path_or("MACHINES_FILE", defaults.machines_file),
        };

        let job_timeout = parse_opt(&lookup, "JOB_TIMEOUT_SECS")?.map(Duration::from_secs);

        let jobs = JobsConfig {
            jobs_dir: path_or("JOBS_DIR", base_dir.join("jobs")),
            roles_dir: path_or("ROLES_DIR", base_dir.join("roles")),
            engine: EngineConfig {
                program: lookup("ENGINE_PROGRAM")
                    .unwrap_or_else(|| DEFAULT_ENGINE_PROGRAM.into())
                    .into(),
                ..EngineConfig::default()
            },
            max_concurrent_jobs: parse_or(
                &lookup,
                "MAX_CONCURRENT_JOBS",
                DEFAULT_MAX_CONCURRENT_JOBS,
            )?,
            job_timeout,
            base_dir,
        };

        let orphan_policy = match lookup("ORPHAN_POLICY") {
            Some(value) => value.parse::<OrphanPolicy>().map_err(|e| {
                ConfigError::Invalid {
                    var: "ORPHAN_POLICY",
                    value,
                    reason: e.to_string(),
                }
            })?,
            None => OrphanPolicy::default(),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            site,
            jobs,
            orphan_policy,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, var)?.unwrap_or(default))
}

fn parse_opt<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
