//! Backup Vault - Per-Packet Pre-Mutation Snapshots
//!
//! # Storage Format
//!
//! ```text
//! mcp-data/backups/
//! └── {packet_id}/
//!     ├── data/config.json      (pre-apply content)
//!     └── addons/old/plugin.js
//! ```
//!
//! Each file is captured at most once per set, so re-running apply after a
//! partial failure never overwrites an original with already-mutated content.
//! Sets are never removed by the engine.

use super::ApplyFault;
use crate::packets::PacketId;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding one backup set per packet id
#[derive(Debug, Clone)]
pub struct BackupVault {
    dir: PathBuf,
}

impl BackupVault {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Create (if needed) and return the backup set for `id`.
    pub fn ensure(&self, id: &PacketId) -> Result<BackupSet, ApplyFault> {
        let set = self.set_for(id)?;
        fs::create_dir_all(&set.root).map_err(|source| ApplyFault::Io {
            path: set.root.display().to_string(),
            source,
        })?;
        Ok(set)
    }

    /// The existing backup set for `id`, or `None` if apply never started.
    pub fn open(&self, id: &PacketId) -> Result<Option<BackupSet>, ApplyFault> {
        let set = self.set_for(id)?;
        Ok(set.root.is_dir().then_some(set))
    }

    pub fn exists(&self, id: &PacketId) -> bool {
        matches!(self.open(id), Ok(Some(_)))
    }

    fn set_for(&self, id: &PacketId) -> Result<BackupSet, ApplyFault> {
        if !id.is_storage_safe() {
            return Err(ApplyFault::UnsafePath {
                path: id.to_string(),
            });
        }
        Ok(BackupSet {
            root: self.dir.join(id.as_str()),
        })
    }
}

/// Snapshot directory for a single packet, mirroring working-tree paths
#[derive(Debug, Clone)]
pub struct BackupSet {
    root: PathBuf,
}

impl BackupSet {
    fn entry(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Copy `source` into the set under `rel` unless already captured.
    ///
    /// Returns `true` when a copy was taken.
    pub fn capture(&self, rel: &str, source: &Path) -> Result<bool, ApplyFault> {
        let dest = self.entry(rel);
        if dest.exists() {
            debug!("Backup for {} already captured", rel);
            return Ok(false);
        }
        copy_with_parents(source, &dest)?;
        debug!("Captured backup of {}", rel);
        Ok(true)
    }

    /// Copy the captured file for `rel` back to `target`.
    ///
    /// Returns `false` when nothing was captured for `rel`.
    pub fn restore(&self, rel: &str, target: &Path) -> Result<bool, ApplyFault> {
        let src = self.entry(rel);
        if !src.is_file() {
            return Ok(false);
        }
        copy_with_parents(&src, target)?;
        debug!("Restored {} from backup", rel);
        Ok(true)
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.entry(rel).is_file()
    }
}

fn copy_with_parents(from: &Path, to: &Path) -> Result<(), ApplyFault> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|source| ApplyFault::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    fs::copy(from, to).map_err(|source| ApplyFault::Io {
        path: to.display().to_string(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_before_ensure_is_none() {
        let temp = TempDir::new().unwrap();
        let vault = BackupVault::new(temp.path().join("backups"));
        let id = PacketId::from_string("div_1");

        assert!(vault.open(&id).unwrap().is_none());
        vault.ensure(&id).unwrap();
        assert!(vault.exists(&id));
    }

    #[test]
    fn test_capture_once() {
        let temp = TempDir::new().unwrap();
        let vault = BackupVault::new(temp.path().join("backups"));
        let set = vault.ensure(&PacketId::from_string("div_1")).unwrap();

        let file = temp.path().join("a.txt");
        fs::write(&file, "original").unwrap();
        assert!(set.capture("nested/a.txt", &file).unwrap());

        fs::write(&file, "mutated").unwrap();
        assert!(!set.capture("nested/a.txt", &file).unwrap());

        let out = temp.path().join("restored.txt");
        assert!(set.restore("nested/a.txt", &out).unwrap());
        assert_eq!(fs::read_to_string(out).unwrap(), "original");
    }

    #[test]
    fn test_restore_missing_entry() {
        let temp = TempDir::new().unwrap();
        let vault = BackupVault::new(temp.path().to_path_buf());
        let set = vault.ensure(&PacketId::from_string("div_1")).unwrap();

        assert!(!set.restore("never.txt", &temp.path().join("never.txt")).unwrap());
        assert!(!temp.path().join("never.txt").exists());
    }

    #[test]
    fn test_unsafe_id_rejected() {
        let temp = TempDir::new().unwrap();
        let vault = BackupVault::new(temp.path().to_path_buf());
        assert!(matches!(
            vault.ensure(&PacketId::from_string("../escape")),
            Err(ApplyFault::UnsafePath { .. })
        ));
    }
}
