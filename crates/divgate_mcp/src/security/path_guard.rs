//! Path Guard - Keeps Packet Paths Inside the Working Tree
//!
//! Packet paths are caller-declared strings. Before they reach the policy
//! table or the file system they must be plain relative paths.
//!
//! # Security Model
//!
//! - Absolute paths and drive/UNC prefixes are denied
//! - ".." components are denied
//! - Empty paths are denied
//! - Symlinks are not resolved; the working tree is trusted

use super::SecurityError;
use std::path::{Component, Path, PathBuf};

/// Check that `relative` is a plain path below the working root.
pub fn check_relative(relative: &str) -> Result<(), SecurityError> {
    if relative.trim().is_empty() {
        return Err(SecurityError::EmptyPath);
    }

    let path = Path::new(relative);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(SecurityError::PathTraversal {
                    path: relative.to_string(),
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SecurityError::AbsolutePath {
                    path: relative.to_string(),
                })
            }
        }
    }

    // Windows-style separators are not components on unix; reject them anyway.
    if relative.starts_with('\\') {
        return Err(SecurityError::AbsolutePath {
            path: relative.to_string(),
        });
    }
    if relative.split(['/', '\\']).any(|seg| seg == "..") {
        return Err(SecurityError::PathTraversal {
            path: relative.to_string(),
        });
    }

    Ok(())
}

/// Join a checked relative path onto a root.
pub fn resolve(root: &Path, relative: &str) -> Result<PathBuf, SecurityError> {
    check_relative(relative)?;
    Ok(root.join(relative))
}
