//! Error types for `quire-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

use std::path::{Path, PathBuf};

use crate::hasher::NodeHash;

/// Unified error type for all core operations.
///
/// Each variant carries the offending hash, path or name so the caller can
/// show a meaningful message without re-resolving anything.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A name was empty or unusable after sanitising.
    #[error("invalid name {name:?}: {reason}")]
    Validation { name: String, reason: String },

    /// No node with this hash exists in the tree.
    #[error("node not found: {0}")]
    NotFound(NodeHash),

    /// A path on disk or in the registry does not exist.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// The destination is already occupied by another node.
    #[error("already exists: {path} ({hash})")]
    AlreadyExists { path: PathBuf, hash: NodeHash },

    /// A disk operation failed. The message is the underlying I/O error.
    #[error("i/o error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// The mutation would break a tree invariant (cycles, moving roots, ...).
    #[error("invariant violation at {hash}: {reason}")]
    InvariantViolation { hash: NodeHash, reason: String },

    /// Failed to parse or serialise a TOML file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// The runtime stopped an action before it finished.
    #[error("action interrupted: {0}")]
    Interrupted(String),
}

impl CoreError {
    /// Wraps a disk-layer failure for `path`.
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn validation(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invariant(hash: NodeHash, reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            hash,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout `quire-core`.
pub type CoreResult<T> = Result<T, CoreError>;
