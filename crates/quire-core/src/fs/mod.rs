//! Disk access for the virtual tree.
//!
//! [`DiskIo`] abstracts the storage backend ([`LocalDisk`] for the real
//! filesystem, [`MemoryDisk`] for tests and embedding), [`scan_root`] turns
//! a directory into a detached [`Subtree`](crate::tree::Subtree), and
//! [`sanitize`] covers user-supplied file names.

pub mod disk;
pub mod entry;
pub mod memory;
pub mod sanitize;
pub mod scan;

pub use disk::{DiskIo, LocalDisk};
pub use entry::FileEntry;
pub use memory::{DiskOp, MemoryDisk};
pub use sanitize::{FilenameGenerator, FilenameSanitizer, NameSanitizer, PatternFilenameGenerator};
pub use scan::{scan_root, ScanOptions};
