//! Security Subsystem
//!
//! - `path_guard`: packet paths must stay relative and inside the working tree
//! - `audit`: append-only record of dispatcher traffic

mod audit;
pub mod path_guard;

pub use audit::AuditLog;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Path traversal denied: {path}")]
    PathTraversal { path: String },

    #[error("Absolute path denied: {path}")]
    AbsolutePath { path: String },

    #[error("Empty path")]
    EmptyPath,

    #[error("Audit log error: {0}")]
    AuditError(String),
}
