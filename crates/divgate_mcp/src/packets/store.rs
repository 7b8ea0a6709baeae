//! Packet Store - Persistent Packet Records
//!
//! One JSON file per packet id, so records can be inspected and edited by
//! the dashboard or by hand.
//!
//! # Storage Format
//!
//! ```text
//! mcp-data/queue/
//! ├── {packet_id_1}.json
//! ├── {packet_id_2}.json
//! └── ...
//! ```

use super::{Packet, PacketId};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Packet {0} already exists")]
    AlreadyExists(PacketId),

    #[error("Packet id '{0}' cannot be used as a storage key")]
    InvalidId(PacketId),

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse packet file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize packet: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Packet store lock poisoned")]
    Poisoned,
}

/// Keyed packet collection
///
/// `list` is ordered by `createdAt`, newest first.
pub trait PacketStore: Send + Sync {
    /// Insert a new record; fails if the id is taken.
    fn create(&self, packet: &Packet) -> Result<(), StoreError>;

    /// Overwrite an existing record (status transitions).
    fn update(&self, packet: &Packet) -> Result<(), StoreError>;

    fn get(&self, id: &PacketId) -> Result<Option<Packet>, StoreError>;

    fn list(&self) -> Result<Vec<Packet>, StoreError>;
}

fn sort_newest_first(packets: &mut [Packet]) {
    packets.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn ensure_key(id: &PacketId) -> Result<(), StoreError> {
    if id.is_storage_safe() {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.clone()))
    }
}

// =============================================================================
// Directory-backed store
// =============================================================================

/// Directory-backed packet store
pub struct FilePacketStore {
    dir: PathBuf,
}

impl FilePacketStore {
    /// Create a new packet store, creating the directory if needed
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            action: "create packet store directory",
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn packet_path(&self, id: &PacketId) -> PathBuf {
        self.dir.join(format!("{}.json", id.0))
    }

    fn write(&self, packet: &Packet) -> Result<(), StoreError> {
        let path = self.packet_path(&packet.id);
        let json = serde_json::to_string_pretty(packet)?;

        atomic_write(&path, json.as_bytes()).map_err(|source| StoreError::Io {
            action: "write packet file",
            path: path.clone(),
            source,
        })?;

        debug!("Saved packet {} to {}", packet.id, path.display());
        Ok(())
    }

    fn read(path: &Path) -> Result<Packet, StoreError> {
        let json = fs::read_to_string(path).map_err(|source| StoreError::Io {
            action: "read packet file",
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl PacketStore for FilePacketStore {
    fn create(&self, packet: &Packet) -> Result<(), StoreError> {
        ensure_key(&packet.id)?;
        if self.packet_path(&packet.id).exists() {
            return Err(StoreError::AlreadyExists(packet.id.clone()));
        }
        self.write(packet)
    }

    fn update(&self, packet: &Packet) -> Result<(), StoreError> {
        ensure_key(&packet.id)?;
        self.write(packet)
    }

    fn get(&self, id: &PacketId) -> Result<Option<Packet>, StoreError> {
        if !id.is_storage_safe() {
            return Ok(None);
        }

        let path = self.packet_path(id);
        if !path.exists() {
            return Ok(None);
        }

        Self::read(&path).map(Some)
    }

    fn list(&self) -> Result<Vec<Packet>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            action: "read packet store directory",
            path: self.dir.clone(),
            source,
        })?;

        let mut packets = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::Io {
                    action: "read packet store directory",
                    path: self.dir.clone(),
                    source,
                })?
                .path();

            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            packets.push(Self::read(&path)?);
        }

        sort_newest_first(&mut packets);
        debug!("Loaded {} packets from {}", packets.len(), self.dir.display());
        Ok(packets)
    }
}

/// Atomic write via temp file + rename
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(".tmp_{}", uuid::Uuid::new_v4()));
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-memory packet store for tests and embedding
#[derive(Default)]
pub struct MemoryPacketStore {
    packets: RwLock<HashMap<PacketId, Packet>>,
}

impl MemoryPacketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PacketStore for MemoryPacketStore {
    fn create(&self, packet: &Packet) -> Result<(), StoreError> {
        ensure_key(&packet.id)?;
        let mut guard = self.packets.write().map_err(|_| StoreError::Poisoned)?;
        if guard.contains_key(&packet.id) {
            return Err(StoreError::AlreadyExists(packet.id.clone()));
        }
        guard.insert(packet.id.clone(), packet.clone());
        Ok(())
    }

    fn update(&self, packet: &Packet) -> Result<(), StoreError> {
        ensure_key(&packet.id)?;
        let mut guard = self.packets.write().map_err(|_| StoreError::Poisoned)?;
        guard.insert(packet.id.clone(), packet.clone());
        Ok(())
    }

    fn get(&self, id: &PacketId) -> Result<Option<Packet>, StoreError> {
        let guard = self.packets.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Packet>, StoreError> {
        let guard = self.packets.read().map_err(|_| StoreError::Poisoned)?;
        let mut packets: Vec<Packet> = guard.values().cloned().collect();
        sort_newest_first(&mut packets);
        Ok(packets)
    }
}
