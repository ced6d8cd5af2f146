//! Detached subtrees.
//!
//! A [`Subtree`] is what `remove` hands back and what `insert` accepts: a
//! root hash plus every node below it, with no connection to any tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::hasher::NodeHash;
use crate::tree::node::Node;
use crate::tree::order::sort_children;

#[derive(Debug, Clone, PartialEq)]
pub struct Subtree {
    root: NodeHash,
    nodes: HashMap<NodeHash, Node>,
}

impl Subtree {
    /// A subtree consisting of one node.
    pub fn single(node: impl Into<Node>) -> Self {
        let mut node = node.into();
        node.set_parent(None);
        let root = node.hash();
        let mut nodes = HashMap::new();
        nodes.insert(root, node);
        Self { root, nodes }
    }

    pub(crate) fn from_parts(root: NodeHash, nodes: HashMap<NodeHash, Node>) -> Self {
        Self { root, nodes }
    }

    pub(crate) fn into_parts(self) -> (NodeHash, HashMap<NodeHash, Node>) {
        (self.root, self.nodes)
    }

    pub fn root_hash(&self) -> NodeHash {
        self.root
    }

    pub fn root(&self) -> &Node {
        // The constructors guarantee the root is present.
        &self.nodes[&self.root]
    }

    pub fn get(&self, hash: NodeHash) -> Option<&Node> {
        self.nodes.get(&hash)
    }

    pub fn contains(&self, hash: NodeHash) -> bool {
        self.nodes.contains_key(&hash)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn hashes(&self) -> impl Iterator<Item = NodeHash> + '_ {
        self.nodes.keys().copied()
    }

    /// Adds `node` as a child of `parent`, keeping the parent's children
    /// sorted.
    pub fn add_child(&mut self, parent: NodeHash, node: impl Into<Node>) -> CoreResult<NodeHash> {
        let mut node = node.into();
        let hash = node.hash();
        if self.nodes.contains_key(&hash) {
            return Err(CoreError::AlreadyExists {
                path: node.path().to_path_buf(),
                hash,
            });
        }
        let parent_dir = self
            .nodes
            .get_mut(&parent)
            .ok_or(CoreError::NotFound(parent))?
            .as_dir_mut()
            .ok_or_else(|| CoreError::invariant(parent, "parent is not a directory"))?;
        parent_dir.children.push(hash);
        node.set_parent(Some(parent));
        self.nodes.insert(hash, node);
        sort_children(&mut self.nodes, parent);
        Ok(hash)
    }

    /// Moves the whole subtree to `new_root_path`.
    ///
    /// Every node gets a new path and therefore a new hash; child order is
    /// kept because names below the root do not change.
    pub(crate) fn rebase(mut self, new_root_path: &Path) -> Self {
        let old_root = self.root;
        let mut out = HashMap::with_capacity(self.nodes.len());
        let root = relocate_into(
            &mut self.nodes,
            old_root,
            new_root_path.to_path_buf(),
            None,
            &mut out,
        )
        .unwrap_or(old_root);
        Self { root, nodes: out }
    }
}

fn relocate_into(
    old: &mut HashMap<NodeHash, Node>,
    hash: NodeHash,
    new_path: PathBuf,
    new_parent: Option<NodeHash>,
    out: &mut HashMap<NodeHash, Node>,
) -> Option<NodeHash> {
    let mut node = old.remove(&hash)?;
    node.relocate(new_path, new_parent);
    let new_hash = node.hash();

    if let Some(dir) = node.as_dir_mut() {
        let children = std::mem::take(&mut dir.children);
        let base = dir.path.clone();
        for child in children {
            let Some(name) = old.get(&child).map(|c| c.name().to_string()) else {
                continue;
            };
            if let Some(moved) = relocate_into(old, child, base.join(name), Some(new_hash), out) {
                dir.children.push(moved);
            }
        }
    }

    out.insert(new_hash, node);
    Some(new_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_path;
    use crate::tree::node::{DirectoryNode, FileNode};

    fn sample() -> Subtree {
        let mut sub = Subtree::single(DirectoryNode::new(PathBuf::from("/docs/notes")));
        let root = sub.root_hash();
        let inner = sub
            .add_child(root, DirectoryNode::new(PathBuf::from("/docs/notes/inner")))
            .unwrap();
        sub.add_child(root, FileNode::new(PathBuf::from("/docs/notes/a.md")))
            .unwrap();
        sub.add_child(inner, FileNode::new(PathBuf::from("/docs/notes/inner/b.md")))
            .unwrap();
        sub
    }

    #[test]
    fn add_child_keeps_order_and_parent() {
        let sub = sample();
        let root = sub.root().as_dir().unwrap();
        let names: Vec<&str> = root
            .children()
            .iter()
            .map(|h| sub.get(*h).unwrap().name())
            .collect();
        assert_eq!(names, vec!["inner", "a.md"]);
        let a = sub.get(hash_path(Path::new("/docs/notes/a.md"))).unwrap();
        assert_eq!(a.parent(), Some(sub.root_hash()));
    }

    #[test]
    fn add_child_rejects_duplicates() {
        let mut sub = sample();
        let root = sub.root_hash();
        let err = sub
            .add_child(root, FileNode::new(PathBuf::from("/docs/notes/a.md")))
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
        assert_eq!(sub.len(), 4);
    }

    #[test]
    fn add_child_under_file_is_rejected() {
        let mut sub = sample();
        let file = hash_path(Path::new("/docs/notes/a.md"));
        let err = sub
            .add_child(file, FileNode::new(PathBuf::from("/docs/notes/a.md/x")))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
    }

    #[test]
    fn rebase_rehashes_every_node() {
        let sub = sample();
        let old: Vec<NodeHash> = sub.hashes().collect();
        let moved = sub.rebase(Path::new("/archive/old-notes"));

        assert_eq!(moved.len(), 4);
        for hash in old {
            assert!(!moved.contains(hash));
        }
        assert_eq!(moved.root_hash(), hash_path(Path::new("/archive/old-notes")));
        assert_eq!(moved.root().name(), "old-notes");
        assert!(moved.root().parent().is_none());

        let deep = hash_path(Path::new("/archive/old-notes/inner/b.md"));
        let inner = hash_path(Path::new("/archive/old-notes/inner"));
        assert_eq!(moved.get(deep).unwrap().parent(), Some(inner));
        assert_eq!(
            moved.get(inner).unwrap().as_dir().unwrap().children(),
            &[deep]
        );
    }
}
