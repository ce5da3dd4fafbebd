//! Job identifiers.
//!
//! A job id is the name of its workspace directory. New ids are UUIDv7
//! strings, so sorting ids lexicographically also sorts jobs by creation
//! time. Ids read back from disk or from a URL are accepted as long as they
//! are a single, plain path component made of URL- and HTML-safe characters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identifier of a job, equal to its workspace directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Draw a fresh, time-ordered id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Parse an externally supplied id.
    ///
    /// Rejects anything that could escape the jobs root when joined onto it
    /// (empty strings, `.`/`..`, hidden names, path separators) and anything
    /// outside ASCII letters, digits, `-`, `_` and `.`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if !is_valid_job_name(raw) {
            return Err(CoreError::Validation(format!("Invalid job id: {raw:?}")));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns `true` if `name` can be used as a workspace directory name.
///
/// Valid names can be placed in URLs and markup without escaping.
pub fn is_valid_job_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
