//! Child ordering for directories.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::hasher::NodeHash;
use crate::tree::node::Node;

/// Directories first, then case-insensitive name, then exact name so the
/// order is total.
pub fn compare_nodes(a: &Node, b: &Node) -> Ordering {
    let dir_cmp = b.is_dir().cmp(&a.is_dir());
    if dir_cmp != Ordering::Equal {
        return dir_cmp;
    }

    a.name()
        .to_lowercase()
        .cmp(&b.name().to_lowercase())
        .then_with(|| a.name().cmp(b.name()))
}

/// Map value that holds a node, either owned or shared with older snapshots.
pub(crate) trait NodeSlot: AsRef<Node> {
    fn node_mut(&mut self) -> &mut Node;
}

impl NodeSlot for Node {
    fn node_mut(&mut self) -> &mut Node {
        self
    }
}

impl NodeSlot for Arc<Node> {
    /// Clones the node first if a published snapshot still shares it.
    fn node_mut(&mut self) -> &mut Node {
        Arc::make_mut(self)
    }
}

/// Sorts a list of hashes by the nodes they point to.
///
/// Hashes missing from `nodes` sort last, in their original order.
pub(crate) fn sort_hashes<N: AsRef<Node>>(hashes: &mut [NodeHash], nodes: &HashMap<NodeHash, N>) {
    hashes.sort_by(|a, b| match (nodes.get(a), nodes.get(b)) {
        (Some(na), Some(nb)) => compare_nodes(na.as_ref(), nb.as_ref()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Re-sorts the children of directory `dir` in place.
pub(crate) fn sort_children<N: NodeSlot>(nodes: &mut HashMap<NodeHash, N>, dir: NodeHash) {
    let mut children = match nodes.get_mut(&dir).and_then(|n| n.node_mut().as_dir_mut()) {
        Some(d) => std::mem::take(&mut d.children),
        None => return,
    };
    sort_hashes(&mut children, nodes);
    if let Some(d) = nodes.get_mut(&dir).and_then(|n| n.node_mut().as_dir_mut()) {
        d.children = children;
    }
}
