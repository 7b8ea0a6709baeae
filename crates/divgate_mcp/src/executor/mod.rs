//! Apply/Rollback Executor
//!
//! Performs a packet's file operations against a working tree and undoes
//! them from the packet's backup set.
//!
//! # Failure Semantics
//!
//! `apply` walks `changes` in order and stops at the first failing change.
//! Earlier changes stay applied (each `modify`/`delete` target was captured
//! first), the failing change is left untouched, and nothing is unwound.
//! Callers recover by running `rollback`, which only restores what was
//! captured and treats missing backups as no-ops.

mod backup;

pub use backup::{BackupSet, BackupVault};

use crate::packets::{ChangeOp, Packet, PacketId};
use crate::security::path_guard;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ApplyFault {
    #[error("File {path} already exists")]
    AlreadyExists { path: String },

    #[error("File {path} not found")]
    NotFound { path: String },

    #[error("Failed to apply patch to {path}")]
    PatchFailed { path: String },

    #[error("Unsafe path {path}")]
    UnsafePath { path: String },

    #[error("No backup found for packet {id}")]
    NoBackup { id: PacketId },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Apply every change of `packet` under `root`.
///
/// The packet must already be validated; paths are re-checked here before
/// any I/O happens.
pub fn apply(packet: &Packet, root: &Path, vault: &BackupVault) -> Result<(), ApplyFault> {
    let targets = resolve_targets(packet, root)?;
    let backups = vault.ensure(&packet.id)?;
    // Files this packet created have no pre-apply content to capture.
    let mut created: HashSet<&Path> = HashSet::new();

    for (change, target) in packet.changes.iter().zip(&targets) {
        if change.operation.needs_backup()
            && target.is_file()
            && !created.contains(target.as_path())
        {
            backups.capture(&change.path, target)?;
        }

        match change.operation {
            ChangeOp::Create => {
                if target.exists() {
                    return Err(ApplyFault::AlreadyExists {
                        path: change.path.clone(),
                    });
                }
                write_file(target, change.content.as_deref().unwrap_or_default())?;
                created.insert(target.as_path());
            }
            ChangeOp::Delete => {
                if target.exists() {
                    fs::remove_file(target).map_err(|source| io_fault(target, source))?;
                }
            }
            ChangeOp::Modify => {
                if !target.exists() {
                    return Err(ApplyFault::NotFound {
                        path: change.path.clone(),
                    });
                }
                if let Some(content) = &change.content {
                    write_file(target, content)?;
                } else if let Some(patch) = &change.patch {
                    let patched = patch_file(target, &change.path, patch)?;
                    write_file(target, &patched)?;
                }
            }
        }
        debug!("Applied {:?} {}", change.operation, change.path);
    }

    info!(
        "Applied packet {} ({} changes)",
        packet.id,
        packet.changes.len()
    );
    Ok(())
}

/// Undo `packet` under `root` from its backup set.
///
/// Created files are removed; modified and deleted files are restored when
/// a backup was captured for them.
pub fn rollback(packet: &Packet, root: &Path, vault: &BackupVault) -> Result<(), ApplyFault> {
    let backups = vault.open(&packet.id)?.ok_or_else(|| ApplyFault::NoBackup {
        id: packet.id.clone(),
    })?;
    let targets = resolve_targets(packet, root)?;

    for (change, target) in packet.changes.iter().zip(&targets) {
        match change.operation {
            ChangeOp::Create => {
                // A captured original means the path existed before apply and
                // an earlier change in this packet already restored it.
                if backups.contains(&change.path) {
                    debug!("Keeping restored {}", change.path);
                } else if target.exists() {
                    fs::remove_file(target).map_err(|source| io_fault(target, source))?;
                }
            }
            ChangeOp::Modify | ChangeOp::Delete => {
                if !backups.restore(&change.path, target)? {
                    debug!("No backup for {}, skipping", change.path);
                }
            }
        }
    }

    info!("Rolled back packet {}", packet.id);
    Ok(())
}

fn resolve_targets(packet: &Packet, root: &Path) -> Result<Vec<PathBuf>, ApplyFault> {
    packet
        .changes
        .iter()
        .map(|change| {
            path_guard::resolve(root, &change.path).map_err(|_| ApplyFault::UnsafePath {
                path: change.path.clone(),
            })
        })
        .collect()
}

fn patch_file(target: &Path, rel: &str, patch: &str) -> Result<String, ApplyFault> {
    let original = match fs::read_to_string(target) {
        Ok(text) => text,
        // Binary content cannot take a text diff.
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return Err(ApplyFault::PatchFailed {
                path: rel.to_string(),
            })
        }
        Err(source) => return Err(io_fault(target, source)),
    };

    let failed = || ApplyFault::PatchFailed {
        path: rel.to_string(),
    };
    let parsed = diffy::Patch::from_str(patch).map_err(|_| failed())?;
    diffy::apply(&original, &parsed).map_err(|_| failed())
}

fn write_file(target: &Path, content: &str) -> Result<(), ApplyFault> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| io_fault(parent, source))?;
    }
    fs::write(target, content).map_err(|source| io_fault(target, source))
}

fn io_fault(path: &Path, source: io::Error) -> ApplyFault {
    ApplyFault::Io {
        path: path.display().to_string(),
        source,
    }
}
