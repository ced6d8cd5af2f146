//! Disk entry metadata as reported by a [`DiskIo`](super::DiskIo) backend.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use unicode_normalization::UnicodeNormalization;

/// A single file or directory as seen on disk.
///
/// `FileEntry` is immutable. Directory sizes are reported as `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    path: PathBuf,
    name: String,
    size: u64,
    modified: Option<SystemTime>,
    is_dir: bool,
    is_symlink: bool,
}

impl FileEntry {
    /// Creates a `FileEntry` from a path and its `std::fs` metadata.
    pub fn new(path: PathBuf, metadata: &std::fs::Metadata) -> Self {
        Self {
            name: entry_name(&path),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified: metadata.modified().ok(),
            is_dir: metadata.is_dir(),
            is_symlink: metadata.is_symlink(),
            path,
        }
    }

    /// Creates a `FileEntry` for backends that have no `std::fs::Metadata`.
    pub fn from_parts(path: PathBuf, is_dir: bool, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            name: entry_name(&path),
            size: if is_dir { 0 } else { size },
            modified,
            is_dir,
            is_symlink: false,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last path component, NFC-normalised.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes. Always `0` for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// `true` if the name starts with `.`.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    pub fn is_symlink(&self) -> bool {
        self.is_symlink
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().nfc().collect::<String>())
        .unwrap_or_default()
}
