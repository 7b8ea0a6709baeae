//! Packet Model
//!
//! A packet bundles metadata, a display-only plan, and an ordered list of
//! file operations proposed by an agent. Packets are persisted one record per
//! id in a [`PacketStore`].
//!
//! # Lifecycle
//!
//! ```text
//! draft ──apply──▶ applied ──rollback──▶ rolled_back
//!   │                                        ▲
//!   └──────────────rollback (partial)────────┘
//! ```
//!
//! `review` and `approved` exist for the external caller; the engine never
//! moves a packet into them.

mod store;

pub use store::{FilePacketStore, MemoryPacketStore, PacketStore, StoreError};

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique packet identifier
///
/// Immutable once assigned; keys both the store record and the backup set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub String);

impl PacketId {
    /// Generate a fresh id: `div_<unix millis>_<8 hex>`
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "div_{}_{}",
            Utc::now().timestamp_millis(),
            &suffix[..8]
        ))
    }

    /// Create from an existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Whether the id can be used verbatim as a single directory/file name.
    pub fn is_storage_safe(&self) -> bool {
        !self.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && !self.0.contains(['/', '\\', '\0'])
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PacketId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Author role; selects the path policy applied to the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AddonDev,
    CoreFix,
    ConfigMgr,
    QaOnly,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AddonDev => "addon_dev",
            Role::CoreFix => "core_fix",
            Role::ConfigMgr => "config_mgr",
            Role::QaOnly => "qa_only",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role as declared by the packet author.
///
/// Unknown role strings are kept rather than rejected at decode time so the
/// validator can report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacketRole {
    Known(Role),
    Unrecognized(String),
}

impl PacketRole {
    pub fn known(&self) -> Option<Role> {
        match self {
            PacketRole::Known(role) => Some(*role),
            PacketRole::Unrecognized(_) => None,
        }
    }
}

impl Default for PacketRole {
    fn default() -> Self {
        PacketRole::Unrecognized(String::new())
    }
}

impl From<Role> for PacketRole {
    fn from(role: Role) -> Self {
        PacketRole::Known(role)
    }
}

impl fmt::Display for PacketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketRole::Known(role) => write!(f, "{}", role),
            PacketRole::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Kind of file operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Modify,
    Delete,
}

impl ChangeOp {
    /// Operations that capture a backup before mutating.
    pub fn needs_backup(&self) -> bool {
        matches!(self, ChangeOp::Modify | ChangeOp::Delete)
    }
}

/// One file operation inside a packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    #[serde(alias = "op")]
    pub operation: ChangeOp,

    /// Path relative to the working root
    pub path: String,

    /// Full content (create, or modify-by-replace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Unified diff (modify-by-patch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl Change {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            operation: ChangeOp::Create,
            path: path.into(),
            content: Some(content.into()),
            patch: None,
        }
    }

    pub fn replace(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            operation: ChangeOp::Modify,
            path: path.into(),
            content: Some(content.into()),
            patch: None,
        }
    }

    pub fn patch(path: impl Into<String>, patch: impl Into<String>) -> Self {
        Self {
            operation: ChangeOp::Modify,
            path: path.into(),
            content: None,
            patch: Some(patch.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            operation: ChangeOp::Delete,
            path: path.into(),
            content: None,
            patch: None,
        }
    }
}

/// Advisory scope hints (not enforced)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub risk: String,
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            risk: "low".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaResults {
    #[serde(default)]
    pub status: QaStatus,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// QA requirements and results; informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPlan {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub results: QaResults,
}

impl Default for QaPlan {
    fn default() -> Self {
        Self {
            required: vec!["test:unit".to_string()],
            results: QaResults::default(),
        }
    }
}

/// Rollback metadata; the mechanism itself is always backup-restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackNote {
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub notes: String,
}

impl Default for RollbackNote {
    fn default() -> Self {
        Self {
            strategy: "reverse".to_string(),
            notes: "Auto-generated".to_string(),
        }
    }
}

/// Review lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Draft,
    Review,
    Approved,
    Applied,
    RolledBack,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Approved => "approved",
            Self::Applied => "applied",
            Self::RolledBack => "rolled_back",
        }
    }

    /// States from which `apply` may run.
    pub fn can_apply(&self) -> bool {
        matches!(self, Self::Draft | Self::Review | Self::Approved)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default)]
    pub comments: Vec<Value>,
    /// Stamped on every engine-driven status transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The unit of proposed change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    #[serde(default)]
    pub id: PacketId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub role: PacketRole,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub plan: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_changes")]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub qa: QaPlan,
    #[serde(default)]
    pub rollback: RollbackNote,
    #[serde(default)]
    pub review: Review,
}

impl Packet {
    pub fn status(&self) -> ReviewStatus {
        self.review.status
    }

    /// Reset server-owned fields on a packet submitted whole.
    ///
    /// Assigns an id when absent, stamps `createdAt`, and puts the packet
    /// back into `draft` with no comments.
    pub fn prepare_submission(&mut self) {
        if self.id.is_empty() {
            self.id = PacketId::generate();
        }
        self.created_at = Utc::now();
        self.review = Review::default();
    }

    pub fn mark_applied(&mut self) {
        self.transition(ReviewStatus::Applied);
    }

    pub fn mark_rolled_back(&mut self) {
        self.transition(ReviewStatus::RolledBack);
    }

    fn transition(&mut self, status: ReviewStatus) {
        self.review.status = status;
        self.review.updated_at = Some(Utc::now());
    }

    /// One-line listing entry
    pub fn summary(&self) -> PacketSummary {
        PacketSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.review.status,
            role: self.role.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PacketSummary {
    pub id: PacketId,
    pub title: String,
    pub status: ReviewStatus,
    pub role: String,
}

/// Partial packet accepted by the create-draft operation.
///
/// Every field is optional; missing ones get engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketDraft {
    #[serde(default)]
    pub id: Option<PacketId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub role: Option<PacketRole>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub plan: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_changes")]
    pub changes: Option<Vec<Change>>,
}

impl PacketDraft {
    /// Materialize a `draft` packet, filling defaults.
    pub fn into_packet(self) -> Packet {
        Packet {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(PacketId::generate),
            title: non_empty_or(self.title, "Untitled"),
            author: non_empty_or(self.author, "mcp"),
            role: self.role.unwrap_or(PacketRole::Known(Role::AddonDev)),
            created_at: Utc::now(),
            intent: non_empty_or(self.intent, "feature"),
            scope: self.scope.unwrap_or_default(),
            plan: self.plan.unwrap_or_default(),
            changes: self.changes.unwrap_or_default(),
            qa: QaPlan::default(),
            rollback: RollbackNote::default(),
            review: Review::default(),
        }
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) const CHANGES_NOT_ARRAY: &str = "Changes must be an array";

fn deserialize_changes<'de, D>(deserializer: D) -> Result<Vec<Change>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_array() {
        return Err(D::Error::custom(CHANGES_NOT_ARRAY));
    }
    serde_json::from_value(value).map_err(D::Error::custom)
}

fn deserialize_optional_changes<'de, D>(deserializer: D) -> Result<Option<Vec<Change>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::Array(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(D::Error::custom),
        _ => Err(D::Error::custom(CHANGES_NOT_ARRAY)),
    }
}
