//! Loading and saving lock files.

use anyhow::{Context, Result};
use std::path::Path;

use super::GraphLockFile;
use crate::constants::LOCKFILE_VERSION;
use crate::core::CpkgError;
use crate::utils::fs::atomic_write;

const HEADER: &str = "# Auto-generated lockfile - DO NOT EDIT\n";

impl GraphLockFile {
    /// Load a lock file. Returns `None` when the file does not exist or is
    /// empty.
    ///
    /// # Errors
    ///
    /// [`CpkgError::LockfileParse`] for invalid content, and an error when
    /// the file was written by a newer format version.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Cannot read lockfile: {}\n\n\
                    Possible causes:\n\
                    - Permission denied (check file ownership)\n\
                    - File is locked by another process",
                path.display()
            )
        })?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let lockfile: Self = toml::from_str(&content)
            .map_err(|e| CpkgError::LockfileParse {
                file: path.display().to_string(),
                reason: e.message().trim().to_string(),
            })
            .with_context(|| {
                format!(
                    "Invalid lockfile: {}\n\n\
                    The lockfile may be corrupted. Delete it and run 'cpkg lock' to regenerate it.",
                    path.display()
                )
            })?;

        if lockfile.version > LOCKFILE_VERSION {
            return Err(CpkgError::Other {
                message: format!(
                    "Lockfile version {} is newer than supported version {}.\n\n\
                    This lockfile was created by a newer version of cpkg.\n\
                    Please update cpkg to the latest version to use this lockfile.",
                    lockfile.version, LOCKFILE_VERSION
                ),
            }
            .into());
        }

        let lock = &lockfile.graph_lock;
        let mut ids = std::iter::once(lock.root).chain(lock.nodes.iter().flat_map(|(id, node)| {
            std::iter::once(*id).chain(node.requires.iter().copied()).chain(node.build_requires.iter().copied())
        }));
        if let Some(id) = ids.find(|id| id.0 == u32::MAX) {
            return Err(CpkgError::LockfileParse {
                file: path.display().to_string(),
                reason: format!("node id {id} is out of range"),
            }
            .into());
        }

        Ok(Some(lockfile))
    }

    /// Save with an atomic write, so an interrupted save never leaves a
    /// truncated lock behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = String::from(HEADER);
        content.push_str(&toml::to_string_pretty(self).context("Failed to serialize lockfile")?);

        atomic_write(path, content.as_bytes()).with_context(|| {
            format!(
                "Cannot write lockfile: {}\n\n\
                    Possible causes:\n\
                    - Permission denied\n\
                    - Disk is full or read-only",
                path.display()
            )
        })
    }
}
