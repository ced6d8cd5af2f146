//! Quire core library: a virtual file tree kept in step with disk.
//!
//! `quire-core` mirrors user-opened directories in memory, addresses every
//! node by a hash of its absolute path, and applies create / save / rename
//! / move / delete actions to disk and tree as one unit. It knows nothing
//! about any UI; frontends read the tree and listen for notifications.
//!
//! # Modules
//!
//! - [`hasher`] - Path normalisation and the [`NodeHash`] identity.
//! - [`tree`] - [`VirtualTree`]: snapshot-published node graph with lookup, insert, remove and move.
//! - [`roots`] - [`RootRegistry`] of opened top-level paths and its [`RootStore`] persistence.
//! - [`executor`] - [`ActionExecutor`]: validated, atomic disk + tree actions.
//! - [`event`] - [`Command`]s in, [`Notification`]s out via the [`UpdateBroadcaster`].
//! - [`action`] - Action catalogue for menus and palettes.
//! - [`fs`] - Disk backends, directory scanning and file name rules.
//! - [`config`] - TOML settings and the live [`ConfigStore`].
//! - [`error`] - Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod action;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod fs;
pub mod hasher;
pub mod roots;
pub mod tree;

pub use action::{ActionCategory, ActionDescriptor, ActionKind, ActionRegistry};
pub use config::{Config, ConfigStore};
pub use error::{CoreError, CoreResult};
pub use event::{Command, Notification, NotificationKind, NotificationSink, UpdateBroadcaster};
pub use executor::{ActionContext, ActionExecutor, ActionExecutorBuilder, Outcome};
pub use fs::{
    DiskIo, FileEntry, FilenameGenerator, FilenameSanitizer, LocalDisk, MemoryDisk, NameSanitizer,
    PatternFilenameGenerator, ScanOptions,
};
pub use hasher::{hash_path, hash_str, normalize_path, NodeHash};
pub use roots::{MemoryRootStore, RootRegistry, RootStore, TomlRootStore};
pub use tree::{DirectoryNode, FileNode, Node, NodeKind, Subtree, TreeState, VirtualTree};

/// Composes `s` into NFC.
///
/// Node names and hashed paths go through this so a name read back from a
/// filesystem that hands out decomposed (NFD) names matches the one the user
/// typed.
pub fn nfc_string(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    s.nfc().collect()
}
