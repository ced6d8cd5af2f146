//! Node types held by the virtual tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::fs::entry::FileEntry;
use crate::hasher::{hash_path, normalize_path, NodeHash};

/// Whether a node is a directory or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Directory,
    File,
}

/// A directory in the tree.
///
/// `children` holds hashes only; the parent reference is likewise a hash,
/// so a node never owns its neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryNode {
    pub(crate) hash: NodeHash,
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeHash>,
    pub(crate) modified: Option<SystemTime>,
    pub(crate) children: Vec<NodeHash>,
}

impl DirectoryNode {
    /// Creates an empty directory node for `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            hash: hash_path(&path),
            name: display_name(&path),
            path,
            parent: None,
            modified: None,
            children: Vec::new(),
        }
    }

    /// Creates an empty directory node from a scanned disk entry.
    pub fn from_entry(entry: &FileEntry) -> Self {
        Self {
            modified: entry.modified(),
            ..Self::new(entry.path().to_path_buf())
        }
    }

    pub fn hash(&self) -> NodeHash {
        self.hash
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeHash> {
        self.parent
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Child hashes in display order: directories first, then by name.
    pub fn children(&self) -> &[NodeHash] {
        &self.children
    }
}

/// A file in the tree.
///
/// Content is loaded lazily; `content()` is `None` until the file has been
/// read, created or saved through an action.
#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    pub(crate) hash: NodeHash,
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeHash>,
    pub(crate) extension: String,
    pub(crate) size: u64,
    pub(crate) word_count: usize,
    pub(crate) modified: Option<SystemTime>,
    pub(crate) content: Option<Arc<str>>,
}

impl FileNode {
    /// Creates a file node for `path` with no metadata and no content.
    pub fn new(path: PathBuf) -> Self {
        Self {
            hash: hash_path(&path),
            name: display_name(&path),
            extension: extension_of(&path),
            path,
            parent: None,
            size: 0,
            word_count: 0,
            modified: None,
            content: None,
        }
    }

    /// Creates a file node from a scanned disk entry.
    pub fn from_entry(entry: &FileEntry) -> Self {
        Self {
            size: entry.size(),
            modified: entry.modified(),
            ..Self::new(entry.path().to_path_buf())
        }
    }

    pub fn hash(&self) -> NodeHash {
        self.hash
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeHash> {
        self.parent
    }

    /// Lowercased extension without the leading dot (`""` if none).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whitespace-separated word count of the last known content.
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Records content that is now known to be on disk.
    pub(crate) fn record_content(&mut self, content: &str, size: u64, modified: Option<SystemTime>) {
        self.word_count = count_words(content);
        self.size = size;
        self.modified = modified;
        self.content = Some(Arc::from(content));
    }
}

/// A directory or a file.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Directory(DirectoryNode),
    File(FileNode),
}

impl Node {
    pub fn hash(&self) -> NodeHash {
        match self {
            Self::Directory(d) => d.hash,
            Self::File(f) => f.hash,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(d) => &d.path,
            Self::File(f) => &f.path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Directory(d) => &d.name,
            Self::File(f) => &f.name,
        }
    }

    pub fn parent(&self) -> Option<NodeHash> {
        match self {
            Self::Directory(d) => d.parent,
            Self::File(f) => f.parent,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Directory(_) => NodeKind::Directory,
            Self::File(_) => NodeKind::File,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// `true` if the node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    pub fn as_dir(&self) -> Option<&DirectoryNode> {
        match self {
            Self::Directory(d) => Some(d),
            Self::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Self::File(f) => Some(f),
            Self::Directory(_) => None,
        }
    }

    pub(crate) fn as_dir_mut(&mut self) -> Option<&mut DirectoryNode> {
        match self {
            Self::Directory(d) => Some(d),
            Self::File(_) => None,
        }
    }

    pub(crate) fn as_file_mut(&mut self) -> Option<&mut FileNode> {
        match self {
            Self::File(f) => Some(f),
            Self::Directory(_) => None,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeHash>) {
        match self {
            Self::Directory(d) => d.parent = parent,
            Self::File(f) => f.parent = parent,
        }
    }

    /// Points the node at a new path. Name, extension and hash follow.
    pub(crate) fn relocate(&mut self, path: PathBuf, parent: Option<NodeHash>) {
        let hash = hash_path(&path);
        let name = display_name(&path);
        match self {
            Self::Directory(d) => {
                d.hash = hash;
                d.name = name;
                d.path = path;
                d.parent = parent;
            }
            Self::File(f) => {
                f.hash = hash;
                f.name = name;
                f.extension = extension_of(&path);
                f.path = path;
                f.parent = parent;
            }
        }
    }
}

impl AsRef<Node> for Node {
    fn as_ref(&self) -> &Node {
        self
    }
}

impl From<DirectoryNode> for Node {
    fn from(dir: DirectoryNode) -> Self {
        Self::Directory(dir)
    }
}

impl From<FileNode> for Node {
    fn from(file: FileNode) -> Self {
        Self::File(file)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| crate::nfc_string(&n.to_string_lossy()))
        .unwrap_or_else(|| normalize_path(path))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub(crate) fn count_words(content: &str) -> usize {
    content.split_whitespace().count()
}
