//! Plain-text output.

use std::fmt::Write;

use quire_core::{ActionDescriptor, FileNode, Node, TreeState};

/// Every root and its descendants, one node per line, indented two spaces
/// per level. Directories end in `/`.
pub fn render_tree(state: &TreeState) -> String {
    let mut out = String::new();
    for root in state.roots() {
        write_node(&mut out, state, root, 0);
    }
    out
}

fn write_node(out: &mut String, state: &TreeState, node: &Node, depth: usize) {
    let suffix = if node.is_dir() { "/" } else { "" };
    let _ = writeln!(
        out,
        "{}  {}{}{}",
        node.hash(),
        "  ".repeat(depth),
        node.name(),
        suffix
    );
    for child in state.children(node.hash()).unwrap_or_default() {
        write_node(out, state, child, depth + 1);
    }
}

pub fn render_attachments(files: &[FileNode]) -> String {
    let mut out = String::new();
    for file in files {
        let _ = writeln!(out, "{}  {}  {} bytes", file.hash(), file.name(), file.size());
    }
    out
}

/// One action per line: id, category, whether it writes to disk, and
/// description.
pub fn render_actions(actions: &[&ActionDescriptor]) -> String {
    let mut out = String::new();
    for action in actions {
        let effect = if action.kind.touches_disk() { "disk" } else { "tree" };
        let _ = writeln!(
            out,
            "{:<18} {:<8} {:<5} {}",
            action.id,
            action.category.label(),
            effect,
            action.description
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{hash_str, ActionRegistry, DirectoryNode, Subtree, VirtualTree};
    use std::path::PathBuf;

    #[test]
    fn tree_is_indented_with_dirs_first() {
        let tree = VirtualTree::new(vec!["md".into()]);
        let mut sub = Subtree::single(DirectoryNode::new(PathBuf::from("/docs")));
        let root = sub.root_hash();
        sub.add_child(root, FileNode::new(PathBuf::from("/docs/a.md")))
            .unwrap();
        sub.add_child(root, DirectoryNode::new(PathBuf::from("/docs/notes")))
            .unwrap();
        tree.insert_root(sub).unwrap();

        let text = render_tree(&tree.snapshot());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("{}  docs/", hash_str("/docs")));
        assert_eq!(lines[1], format!("{}    notes/", hash_str("/docs/notes")));
        assert_eq!(lines[2], format!("{}    a.md", hash_str("/docs/a.md")));
    }

    #[test]
    fn actions_show_whether_they_write_to_disk() {
        let registry = ActionRegistry::new();
        let found: Vec<&ActionDescriptor> = ["delete", "unload"]
            .iter()
            .filter_map(|id| registry.find_by_id(id))
            .filter_map(|kind| registry.descriptor_for(kind))
            .collect();
        let text = render_actions(&found);
        let effects: Vec<&str> = text
            .lines()
            .map(|l| l.split_whitespace().nth(2).unwrap())
            .collect();
        assert_eq!(effects, vec!["disk", "tree"]);
    }

    #[test]
    fn empty_tree_renders_nothing() {
        let tree = VirtualTree::new(Vec::new());
        assert!(render_tree(&tree.snapshot()).is_empty());
    }
}
