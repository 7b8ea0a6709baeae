//! Policy Validator
//!
//! Pure check of a packet against the role → {allow, deny} table. No I/O,
//! never mutates the packet, stops at the first violation.
//!
//! Order of checks:
//! 1. `id`, `title`, `author` non-empty
//! 2. role is one of the known roles
//! 3. `qa_only` packets carry no changes
//! 4. per change: path is a plain relative path, no deny pattern matches,
//!    some allow pattern matches
//!
//! `changes` being a list is enforced when the packet is decoded.

mod rules;

pub use rules::{matches, policy_for, RolePolicy};

use crate::packets::{Packet, PacketRole, Role};
use crate::security::path_guard;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Missing metadata")]
    MissingMetadata,

    #[error("Invalid role")]
    InvalidRole,

    #[error("QA role cannot make changes")]
    QaCannotChange,

    #[error("Unsafe path {path}")]
    UnsafePath { path: String },

    #[error("Access denied to {path} for role {role}")]
    AccessDenied { path: String, role: Role },

    #[error("Path {path} not in allowlist for role {role}")]
    NotAllowed { path: String, role: Role },
}

/// Validate a packet against the role policy.
pub fn validate(packet: &Packet) -> Result<(), PolicyViolation> {
    if packet.id.is_empty() || packet.title.is_empty() || packet.author.is_empty() {
        return Err(PolicyViolation::MissingMetadata);
    }

    let role = match &packet.role {
        PacketRole::Known(role) => *role,
        PacketRole::Unrecognized(_) => return Err(PolicyViolation::InvalidRole),
    };

    // Checked ahead of the table so the message is specific.
    if role == Role::QaOnly && !packet.changes.is_empty() {
        return Err(PolicyViolation::QaCannotChange);
    }

    let policy = policy_for(role);
    for change in &packet.changes {
        check_path(&change.path, role, policy)?;
    }

    Ok(())
}

/// Check one change path: safe shape, then deny list, then allow list.
fn check_path(path: &str, role: Role, policy: RolePolicy) -> Result<(), PolicyViolation> {
    if path_guard::check_relative(path).is_err() {
        return Err(PolicyViolation::UnsafePath {
            path: path.to_string(),
        });
    }

    if policy.deny.iter().any(|deny| matches(path, deny)) {
        return Err(PolicyViolation::AccessDenied {
            path: path.to_string(),
            role,
        });
    }

    if !policy.allow.iter().any(|allow| matches(path, allow)) {
        return Err(PolicyViolation::NotAllowed {
            path: path.to_string(),
            role,
        });
    }

    Ok(())
}

/// Wire form of a validation outcome: `{valid:true}` or `{valid:false, error}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<(), PolicyViolation>> for ValidationReport {
    fn from(result: &Result<(), PolicyViolation>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                error: None,
            },
            Err(violation) => Self {
                valid: false,
                error: Some(violation.to_string()),
            },
        }
    }
}
