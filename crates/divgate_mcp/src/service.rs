//! Packet Service - Store, Validator and Executor Wired Together
//!
//! Every operation re-reads the packet from the store; nothing is carried
//! between calls. `apply` re-runs validation even if the caller already did.

use crate::executor::{self, ApplyFault, BackupVault};
use crate::packets::{Packet, PacketDraft, PacketId, PacketStore, StoreError};
use crate::policy::{self, PolicyViolation, ValidationReport};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("DIV not found: {0}")]
    NotFound(PacketId),

    #[error("Cannot apply invalid DIV: {0}")]
    Invalid(#[source] PolicyViolation),

    #[error("Cannot apply DIV {id} in status {status}")]
    NotApplicable {
        id: PacketId,
        status: crate::packets::ReviewStatus,
    },

    #[error(transparent)]
    Execution(#[from] ApplyFault),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Failures of the requested action itself, as opposed to a bad target.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Execution(_) | EngineError::NotApplicable { .. }
        )
    }
}

pub struct PacketService {
    store: Box<dyn PacketStore>,
    vault: BackupVault,
    root: PathBuf,
}

impl PacketService {
    pub fn new(store: Box<dyn PacketStore>, vault: BackupVault, root: PathBuf) -> Self {
        Self { store, vault, root }
    }

    /// Working tree the executor mutates
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vault(&self) -> &BackupVault {
        &self.vault
    }

    /// All packets, newest first
    pub fn list(&self) -> Result<Vec<Packet>, EngineError> {
        Ok(self.store.list()?)
    }

    pub fn get(&self, id: &PacketId) -> Result<Packet, EngineError> {
        self.store
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    /// Create a `draft` packet, defaulting every missing field.
    pub fn create_draft(&self, draft: PacketDraft) -> Result<Packet, EngineError> {
        let packet = draft.into_packet();
        self.store.create(&packet)?;
        info!("Created draft packet {}", packet.id);
        Ok(packet)
    }

    /// Store a whole packet as a fresh `draft`.
    pub fn submit(&self, mut packet: Packet) -> Result<Packet, EngineError> {
        packet.prepare_submission();
        self.store.create(&packet)?;
        info!("Submitted packet {}", packet.id);
        Ok(packet)
    }

    /// Validate the stored packet. Never changes it.
    pub fn validate(&self, id: &PacketId) -> Result<ValidationReport, EngineError> {
        let packet = self.get(id)?;
        Ok(ValidationReport::from(&policy::validate(&packet)))
    }

    /// Re-fetch, re-validate, apply, and persist the `applied` status.
    pub fn apply(&self, id: &PacketId) -> Result<Packet, EngineError> {
        let mut packet = self.get(id)?;

        if let Err(violation) = policy::validate(&packet) {
            warn!("Refusing to apply {}: {}", id, violation);
            return Err(EngineError::Invalid(violation));
        }

        if !packet.status().can_apply() {
            return Err(EngineError::NotApplicable {
                id: id.clone(),
                status: packet.status(),
            });
        }

        if let Err(fault) = executor::apply(&packet, &self.root, &self.vault) {
            warn!("Apply of {} stopped: {}", id, fault);
            return Err(fault.into());
        }

        packet.mark_applied();
        self.store.update(&packet)?;
        Ok(packet)
    }

    /// Restore from the backup set and persist the `rolled_back` status.
    pub fn rollback(&self, id: &PacketId) -> Result<Packet, EngineError> {
        let mut packet = self.get(id)?;

        if let Err(fault) = executor::rollback(&packet, &self.root, &self.vault) {
            warn!("Rollback of {} failed: {}", id, fault);
            return Err(fault.into());
        }

        packet.mark_rolled_back();
        self.store.update(&packet)?;
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::{Change, MemoryPacketStore, ReviewStatus, Role};
    use std::fs;
    use tempfile::TempDir;

    fn service(temp: &TempDir) -> PacketService {
        let root = temp.path().join("work");
        fs::create_dir_all(&root).unwrap();
        PacketService::new(
            Box::new(MemoryPacketStore::new()),
            BackupVault::new(temp.path().join("backups")),
            root,
        )
    }

    fn draft(role: Role, changes: Vec<Change>) -> PacketDraft {
        PacketDraft {
            role: Some(role.into()),
            changes: Some(changes),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_updates_status() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let p = svc
            .create_draft(draft(Role::AddonDev, vec![Change::create("addons/a.js", "1")]))
            .unwrap();

        let applied = svc.apply(&p.id).unwrap();
        assert_eq!(applied.status(), ReviewStatus::Applied);
        assert!(applied.review.updated_at.is_some());
        assert_eq!(applied.created_at, p.created_at);
        assert_eq!(svc.get(&p.id).unwrap().status(), ReviewStatus::Applied);
    }

    #[test]
    fn test_apply_revalidates() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let p = svc
            .create_draft(draft(Role::AddonDev, vec![Change::create("src/x.ts", "")]))
            .unwrap();

        let err = svc.apply(&p.id).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot apply invalid DIV: Access denied to src/x.ts for role addon_dev"
        );
        assert!(!svc.root().join("src/x.ts").exists());
        assert!(!svc.vault().exists(&p.id));
    }

    #[test]
    fn test_applied_packet_cannot_reapply() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let p = svc
            .create_draft(draft(Role::AddonDev, vec![Change::create("addons/a.js", "")]))
            .unwrap();

        svc.apply(&p.id).unwrap();
        let err = svc.apply(&p.id).unwrap_err();
        assert!(err.is_execution_failure());
        assert!(matches!(err, EngineError::NotApplicable { .. }));
    }

    #[test]
    fn test_partial_failure_stays_draft() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let p = svc
            .create_draft(draft(
                Role::AddonDev,
                vec![
                    Change::create("addons/a.js", "x"),
                    Change::replace("addons/missing.js", "y"),
                ],
            ))
            .unwrap();

        let err = svc.apply(&p.id).unwrap_err();
        assert!(err.is_execution_failure());
        assert_eq!(err.to_string(), "File addons/missing.js not found");
        assert_eq!(svc.get(&p.id).unwrap().status(), ReviewStatus::Draft);

        let rolled = svc.rollback(&p.id).unwrap();
        assert_eq!(rolled.status(), ReviewStatus::RolledBack);
        assert!(!svc.root().join("addons/a.js").exists());
    }

    #[test]
    fn test_unknown_id() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let err = svc.validate(&PacketId::from_string("div_nope")).unwrap_err();
        assert!(!err.is_execution_failure());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_submit_resets_review() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let mut packet = draft(Role::QaOnly, vec![]).into_packet();
        packet.id = PacketId::default();
        packet.review.status = ReviewStatus::Applied;

        let stored = svc.submit(packet).unwrap();
        assert!(!stored.id.is_empty());
        assert_eq!(stored.status(), ReviewStatus::Draft);
    }
}
