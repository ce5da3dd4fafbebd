//! Choices offered on the submission form.
//!
//! Machines come from a plain text file (one per line), playbooks from
//! `*.yml` files in a directory, roles from its subdirectories. Contents are
//! never validated; a missing source yields an empty list.

use std::path::Path;

use serde::Serialize;

/// Playbook files carry this suffix; it is stripped from the listed names.
pub const PLAYBOOK_SUFFIX: &str = ".yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Everything the submission form lets a user pick from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub machines: Vec<String>,
    pub playbooks: Vec<String>,
    pub roles: Vec<String>,
}

impl Catalog {
    pub async fn load(machines_file: &Path, playbooks_dir: &Path, roles_dir: &Path) -> Self {
        Self {
            machines: read_lines(machines_file).await,
            playbooks: list_entries(playbooks_dir, EntryKind::File, PLAYBOOK_SUFFIX).await,
            roles: list_entries(roles_dir, EntryKind::Dir, "").await,
        }
    }
}

/// Sorted names of the entries of `kind` in `dir` ending in `suffix`, with
/// the suffix removed.
pub async fn list_entries(dir: &Path, kind: EntryKind, suffix: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Catalog directory unavailable");
            return names;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        // Follows symlinks, so linked playbooks and roles are listed too.
        let Ok(meta) = tokio::fs::metadata(entry.path()).await else {
            continue;
        };
        let matches_kind = match kind {
            EntryKind::File => meta.is_file(),
            EntryKind::Dir => meta.is_dir(),
        };
        if !matches_kind {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(stem) = name.strip_suffix(suffix) {
            names.push(stem.to_string());
        }
    }

    names.sort();
    names
}

/// Lines of `file`, or nothing if it cannot be read.
pub async fn read_lines(file: &Path) -> Vec<String> {
    match tokio::fs::read_to_string(file).await {
        Ok(contents) => contents.lines().map(str::to_owned).collect(),
        Err(e) => {
            tracing::warn!(file = %file.display(), error = %e, "Failed to read catalog file");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_playbooks_without_suffix() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["web.yml", "db.yml", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").expect("write");
        }
        std::fs::create_dir(dir.path().join("dir.yml")).expect("mkdir");

        let names = list_entries(dir.path(), EntryKind::File, PLAYBOOK_SUFFIX).await;
        assert_eq!(names, ["db", "web"]);
    }

    #[tokio::test]
    async fn lists_role_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["nginx", "common"] {
            std::fs::create_dir(dir.path().join(name)).expect("mkdir");
        }
        std::fs::write(dir.path().join("README.md"), b"").expect("write");

        let names = list_entries(dir.path(), EntryKind::Dir, "").await;
        assert_eq!(names, ["common", "nginx"]);
    }

    #[tokio::test]
    async fn missing_sources_are_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = Catalog::load(
            &dir.path().join("machines"),
            &dir.path().join("playbooks"),
            &dir.path().join("roles"),
        )
        .await;
        assert!(catalog.machines.is_empty());
        assert!(catalog.playbooks.is_empty());
        assert!(catalog.roles.is_empty());
    }

    #[tokio::test]
    async fn reads_machines_line_by_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("machines");
        std::fs::write(&file, "web1\nweb2\r\ndb1\n").expect("write");

        assert_eq!(read_lines(&file).await, ["web1", "web2", "db1"]);
    }
}
