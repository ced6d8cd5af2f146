//! In-memory virtual file tree.
//!
//! [`VirtualTree`] publishes an immutable [`TreeState`] snapshot. Readers
//! clone the snapshot pointer and work against it without holding any lock;
//! writers build a modified copy and swap it in as a whole, so a reader sees
//! either the state before a mutation or the state after it, never a mix.
//! A mutation that fails leaves the published snapshot untouched.

pub mod node;
pub mod order;
pub mod subtree;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{CoreError, CoreResult};
use crate::hasher::NodeHash;

pub use node::{DirectoryNode, FileNode, Node, NodeKind};
pub use order::compare_nodes;
pub use subtree::Subtree;

use order::{sort_children, sort_hashes, NodeSlot};

/// One consistent view of the whole tree.
///
/// Nodes are shared between consecutive snapshots; a mutation copies only
/// the nodes it changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeState {
    nodes: HashMap<NodeHash, Arc<Node>>,
    roots: Vec<NodeHash>,
}

impl TreeState {
    pub fn get(&self, hash: NodeHash) -> Option<&Node> {
        self.nodes.get(&hash).map(|node| &**node)
    }

    pub fn dir(&self, hash: NodeHash) -> Option<&DirectoryNode> {
        self.get(hash).and_then(Node::as_dir)
    }

    pub fn file(&self, hash: NodeHash) -> Option<&FileNode> {
        self.get(hash).and_then(Node::as_file)
    }

    pub fn contains(&self, hash: NodeHash) -> bool {
        self.nodes.contains_key(&hash)
    }

    /// Total number of nodes across all roots.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.roots.iter().filter_map(|h| self.get(*h))
    }

    /// Children of a directory in display order.
    pub fn children(&self, dir: NodeHash) -> Option<Vec<&Node>> {
        let dir = self.dir(dir)?;
        Some(
            dir.children
                .iter()
                .filter_map(|h| self.get(*h))
                .collect(),
        )
    }

    /// Non-document file children of `dir`, in child order.
    pub fn attachments(&self, dir: NodeHash, document_extensions: &[String]) -> Option<Vec<&FileNode>> {
        let children = self.children(dir)?;
        Some(
            children
                .into_iter()
                .filter_map(Node::as_file)
                .filter(|f| !document_extensions.iter().any(|ext| ext == f.extension()))
                .collect(),
        )
    }

    /// `true` if `candidate` is `ancestor` or lies somewhere below it.
    pub fn is_within(&self, candidate: NodeHash, ancestor: NodeHash) -> bool {
        let mut current = Some(candidate);
        while let Some(hash) = current {
            if hash == ancestor {
                return true;
            }
            current = self.get(hash).and_then(Node::parent);
        }
        false
    }

    /// Every hash in the subtree rooted at `hash`, root first.
    pub fn subtree_hashes(&self, hash: NodeHash) -> Vec<NodeHash> {
        let mut out = Vec::new();
        let mut stack = vec![hash];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            if let Some(dir) = node.as_dir() {
                stack.extend(dir.children.iter().rev().copied());
            }
        }
        out
    }

    fn attach(&mut self, subtree: Subtree, parent: Option<NodeHash>) -> CoreResult<NodeHash> {
        if let Some(parent) = parent {
            let node = self.nodes.get(&parent).ok_or(CoreError::NotFound(parent))?;
            if !node.is_dir() {
                return Err(CoreError::invariant(parent, "parent is not a directory"));
            }
        }
        if let Some(taken) = subtree.iter().find(|n| self.nodes.contains_key(&n.hash())) {
            return Err(CoreError::AlreadyExists {
                path: taken.path().to_path_buf(),
                hash: taken.hash(),
            });
        }

        let (root, mut nodes) = subtree.into_parts();
        if let Some(node) = nodes.get_mut(&root) {
            node.set_parent(parent);
        }
        self.nodes
            .extend(nodes.into_iter().map(|(hash, node)| (hash, Arc::new(node))));

        match parent {
            Some(parent) => {
                if let Some(dir) = self.dir_mut(parent) {
                    dir.children.push(root);
                }
                sort_children(&mut self.nodes, parent);
            }
            None => {
                self.roots.push(root);
                sort_hashes(&mut self.roots, &self.nodes);
            }
        }
        Ok(root)
    }

    fn detach(&mut self, hash: NodeHash) -> CoreResult<Subtree> {
        let parent = self
            .nodes
            .get(&hash)
            .ok_or(CoreError::NotFound(hash))?
            .parent();

        match parent {
            Some(parent) => {
                if let Some(dir) = self.dir_mut(parent) {
                    dir.children.retain(|c| *c != hash);
                }
            }
            None => self.roots.retain(|r| *r != hash),
        }

        let mut nodes = HashMap::new();
        for member in self.subtree_hashes(hash) {
            if let Some(node) = self.nodes.remove(&member) {
                nodes.insert(member, Arc::unwrap_or_clone(node));
            }
        }
        if let Some(root) = nodes.get_mut(&hash) {
            root.set_parent(None);
        }
        Ok(Subtree::from_parts(hash, nodes))
    }

    fn relocate(
        &mut self,
        hash: NodeHash,
        new_parent: Option<NodeHash>,
        new_path: &Path,
    ) -> CoreResult<NodeHash> {
        let detached = self.detach(hash)?;
        self.attach(detached.rebase(new_path), new_parent)
    }

    fn dir_mut(&mut self, hash: NodeHash) -> Option<&mut DirectoryNode> {
        self.nodes.get_mut(&hash).and_then(|n| n.node_mut().as_dir_mut())
    }

    fn file_mut(&mut self, hash: NodeHash) -> CoreResult<&mut FileNode> {
        self.nodes
            .get_mut(&hash)
            .ok_or(CoreError::NotFound(hash))?
            .node_mut()
            .as_file_mut()
            .ok_or_else(|| CoreError::invariant(hash, "node is not a file"))
    }
}

/// The shared, concurrently readable tree.
#[derive(Debug, Default)]
pub struct VirtualTree {
    state: RwLock<Arc<TreeState>>,
    writer: Mutex<()>,
    document_extensions: Vec<String>,
}

impl VirtualTree {
    /// Creates an empty tree. `document_extensions` decides which files are
    /// documents; every other file is listed as an attachment.
    pub fn new(document_extensions: Vec<String>) -> Self {
        Self {
            state: RwLock::new(Arc::new(TreeState::default())),
            writer: Mutex::new(()),
            document_extensions: document_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// The currently published state.
    pub fn snapshot(&self) -> Arc<TreeState> {
        Arc::clone(&self.state.read())
    }

    pub fn find(&self, hash: NodeHash) -> Option<Node> {
        self.snapshot().get(hash).cloned()
    }

    pub fn find_dir(&self, hash: NodeHash) -> Option<DirectoryNode> {
        self.snapshot().dir(hash).cloned()
    }

    pub fn find_file(&self, hash: NodeHash) -> Option<FileNode> {
        self.snapshot().file(hash).cloned()
    }

    pub fn roots(&self) -> Vec<Node> {
        self.snapshot().roots().cloned().collect()
    }

    pub fn document_extensions(&self) -> &[String] {
        &self.document_extensions
    }

    /// Non-document children of a directory, computed from the current
    /// snapshot.
    pub fn list_attachments(&self, dir: NodeHash) -> Option<Vec<FileNode>> {
        let snapshot = self.snapshot();
        let attachments = snapshot.attachments(dir, &self.document_extensions)?;
        Some(attachments.into_iter().cloned().collect())
    }

    /// Attaches `subtree` under directory `parent`.
    pub fn insert(&self, subtree: Subtree, parent: NodeHash) -> CoreResult<NodeHash> {
        self.apply(|state| state.attach(subtree, Some(parent)))
    }

    /// Attaches `subtree` as a new root.
    pub fn insert_root(&self, subtree: Subtree) -> CoreResult<NodeHash> {
        self.apply(|state| state.attach(subtree, None))
    }

    /// Detaches and returns the subtree rooted at `hash`.
    pub fn remove(&self, hash: NodeHash) -> CoreResult<Subtree> {
        self.apply(|state| state.detach(hash))
    }

    /// Moves `hash` below `new_parent` and returns its new hash.
    ///
    /// Every node of the moved subtree gets a new identity. Moving a node
    /// into itself or one of its descendants, or moving a root, is refused.
    pub fn move_node(&self, hash: NodeHash, new_parent: NodeHash) -> CoreResult<NodeHash> {
        self.apply(|state| {
            let node = state.get(hash).ok_or(CoreError::NotFound(hash))?;
            let target = state.get(new_parent).ok_or(CoreError::NotFound(new_parent))?;
            if !target.is_dir() {
                return Err(CoreError::invariant(new_parent, "move target is not a directory"));
            }
            if node.is_root() {
                return Err(CoreError::invariant(hash, "roots cannot be moved"));
            }
            if state.is_within(new_parent, hash) {
                return Err(CoreError::invariant(
                    hash,
                    format!("cannot move into itself or its descendant {new_parent}"),
                ));
            }
            if node.parent() == Some(new_parent) {
                return Ok(hash);
            }
            let new_path = target.path().join(node.name());
            state.relocate(hash, Some(new_parent), &new_path)
        })
    }

    /// Renames `hash` in place and returns its new hash.
    pub fn rename_node(&self, hash: NodeHash, new_name: &str) -> CoreResult<NodeHash> {
        self.apply(|state| {
            let node = state.get(hash).ok_or(CoreError::NotFound(hash))?;
            let parent = node.parent();
            let new_path = renamed_path(node.path(), new_name);
            state.relocate(hash, parent, &new_path)
        })
    }

    /// Applies `edit` to the file node `hash` and returns the updated node.
    pub fn update_file<F>(&self, hash: NodeHash, edit: F) -> CoreResult<FileNode>
    where
        F: FnOnce(&mut FileNode),
    {
        self.apply(|state| {
            let file = state.file_mut(hash)?;
            edit(file);
            Ok(file.clone())
        })
    }

    /// Runs `mutate` on a copy of the current state and publishes it. The
    /// copy shares every node `mutate` does not write to.
    fn apply<T, F>(&self, mutate: F) -> CoreResult<T>
    where
        F: FnOnce(&mut TreeState) -> CoreResult<T>,
    {
        let _writer = self.writer.lock();
        let mut next = TreeState::clone(&self.snapshot());
        let out = mutate(&mut next)?;
        *self.state.write() = Arc::new(next);
        Ok(out)
    }
}

/// `path` with its final component replaced by `new_name`.
pub fn renamed_path(path: &Path, new_name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(new_name),
        None => PathBuf::from(new_name),
    }
}
