//! Path → identity hashing.
//!
//! A node's identity is a pure function of its normalised absolute path.
//! Renaming or moving a node therefore retires its old [`NodeHash`] and
//! issues a new one; nothing else in the crate tries to keep identities
//! stable across a path change.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Identity of a node in the virtual tree.
///
/// Displays as 16 lowercase hex digits and parses back from the same form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHash(u64);

impl NodeHash {
    /// Wraps a raw hash value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for NodeHash {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s.trim(), 16).map(Self)
    }
}

/// Normalises a path into the canonical string that gets hashed.
///
/// Backslashes become `/`, the string is re-composed to NFC (macOS hands
/// out NFD file names) and trailing separators are dropped, except for the
/// filesystem root itself.
pub fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut normalized: String = raw.nfc().collect();
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Hashes an already-normalised path string.
///
/// The result is the first eight bytes (big-endian) of the SHA-256 digest,
/// so it is identical across processes and platforms.
pub fn hash_str(normalized: &str) -> NodeHash {
    let digest = Sha256::digest(normalized.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    NodeHash(u64::from_be_bytes(head))
}

/// Normalises `path` and hashes it.
pub fn hash_path(path: &Path) -> NodeHash {
    hash_str(&normalize_path(path))
}
