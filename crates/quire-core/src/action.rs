//! Catalogue of tree actions.
//!
//! Every mutation a frontend can request is one [`ActionKind`].
//! [`ActionRegistry`] provides metadata (id, name, description, category)
//! and fuzzy search so frontends can build menus and palettes without
//! hard-coding the list.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// Every action the executor understands.
///
/// Variants carry no parameters; the payload travels in
/// [`Command`](crate::event::Command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CreateDirectory,
    CreateFile,
    SaveFile,
    Rename,
    Move,
    Delete,
    Unload,
    OpenRoot,
    LoadContent,
}

impl ActionKind {
    /// Stable identifier, e.g. `"create-directory"`.
    pub fn id(self) -> &'static str {
        match self {
            Self::CreateDirectory => "create-directory",
            Self::CreateFile => "create-file",
            Self::SaveFile => "save-file",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::Delete => "delete",
            Self::Unload => "unload",
            Self::OpenRoot => "open-root",
            Self::LoadContent => "load-content",
        }
    }

    /// `true` if the action writes to disk.
    pub fn touches_disk(self) -> bool {
        !matches!(self, Self::Unload | Self::OpenRoot | Self::LoadContent)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Broad category for grouping actions in menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Tree,
    Content,
    Roots,
}

impl ActionCategory {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Tree => "Tree",
            Self::Content => "Content",
            Self::Roots => "Roots",
        }
    }
}

/// Metadata for a single action.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    /// Kebab-case identifier (e.g. `"create-directory"`).
    pub id: &'static str,
    /// Alternative ids accepted by [`ActionRegistry::find_by_id`].
    pub aliases: &'static [&'static str],
    /// Human-readable name (e.g. `"New Folder"`).
    pub name: &'static str,
    pub description: &'static str,
    pub category: ActionCategory,
}

/// Registry of all actions with fuzzy-search support.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    descriptors: Vec<ActionDescriptor>,
}

impl ActionRegistry {
    /// Builds the registry containing every known action.
    pub fn new() -> Self {
        let descriptors = vec![
            ActionDescriptor {
                kind: ActionKind::CreateDirectory,
                id: ActionKind::CreateDirectory.id(),
                aliases: &["dir-new", "mkdir"],
                name: "New Folder",
                description: "Create a directory inside the selected directory",
                category: ActionCategory::Tree,
            },
            ActionDescriptor {
                kind: ActionKind::CreateFile,
                id: ActionKind::CreateFile.id(),
                aliases: &["file-new", "touch"],
                name: "New Document",
                description: "Create a file, naming it after the current time if unnamed",
                category: ActionCategory::Tree,
            },
            ActionDescriptor {
                kind: ActionKind::SaveFile,
                id: ActionKind::SaveFile.id(),
                aliases: &["file-save", "save"],
                name: "Save",
                description: "Write the edited content back to disk",
                category: ActionCategory::Content,
            },
            ActionDescriptor {
                kind: ActionKind::Rename,
                id: ActionKind::Rename.id(),
                aliases: &["file-rename", "dir-rename"],
                name: "Rename",
                description: "Rename a file or directory",
                category: ActionCategory::Tree,
            },
            ActionDescriptor {
                kind: ActionKind::Move,
                id: ActionKind::Move.id(),
                aliases: &["mv"],
                name: "Move",
                description: "Move a file or directory into another directory",
                category: ActionCategory::Tree,
            },
            ActionDescriptor {
                kind: ActionKind::Delete,
                id: ActionKind::Delete.id(),
                aliases: &["file-delete", "dir-delete", "rm"],
                name: "Delete",
                description: "Delete a file or directory from disk",
                category: ActionCategory::Tree,
            },
            ActionDescriptor {
                kind: ActionKind::Unload,
                id: ActionKind::Unload.id(),
                aliases: &["root-close", "close"],
                name: "Close Folder",
                description: "Stop showing a root folder without touching disk",
                category: ActionCategory::Roots,
            },
            ActionDescriptor {
                kind: ActionKind::OpenRoot,
                id: ActionKind::OpenRoot.id(),
                aliases: &["root-open", "open"],
                name: "Open Folder",
                description: "Scan a folder from disk and show it as a root",
                category: ActionCategory::Roots,
            },
            ActionDescriptor {
                kind: ActionKind::LoadContent,
                id: ActionKind::LoadContent.id(),
                aliases: &["file-open"],
                name: "Load Content",
                description: "Read a file's content from disk",
                category: ActionCategory::Content,
            },
        ];
        Self { descriptors }
    }

    /// Returns all descriptors.
    pub fn all(&self) -> &[ActionDescriptor] {
        &self.descriptors
    }

    /// Fuzzy-searches descriptors by matching against name, description, and id.
    /// Returns results sorted by match score (best first).
    pub fn fuzzy_search(&self, query: &str) -> Vec<&ActionDescriptor> {
        if query.is_empty() {
            return self.descriptors.iter().collect();
        }
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, &ActionDescriptor)> = self
            .descriptors
            .iter()
            .filter_map(|d| {
                let best = [d.name, d.description, d.id]
                    .iter()
                    .filter_map(|text| matcher.fuzzy_match(text, query))
                    .max()
                    .unwrap_or(0);
                (best > 0).then_some((best, d))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, d)| d).collect()
    }

    /// Finds an action by id or alias.
    pub fn find_by_id(&self, id: &str) -> Option<ActionKind> {
        self.descriptors
            .iter()
            .find(|d| d.id == id || d.aliases.contains(&id))
            .map(|d| d.kind)
    }

    /// Returns the descriptor for a given action.
    pub fn descriptor_for(&self, kind: ActionKind) -> Option<&ActionDescriptor> {
        self.descriptors.iter().find(|d| d.kind == kind)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_every_kind_once() {
        let registry = ActionRegistry::new();
        assert_eq!(registry.all().len(), 9);
        for d in registry.all() {
            assert_eq!(d.id, d.kind.id());
            assert_eq!(registry.descriptor_for(d.kind).unwrap().id, d.id);
        }
    }

    #[test]
    fn find_by_id_accepts_ids_and_aliases() {
        let registry = ActionRegistry::new();
        assert_eq!(
            registry.find_by_id("create-directory"),
            Some(ActionKind::CreateDirectory)
        );
        assert_eq!(registry.find_by_id("dir-new"), Some(ActionKind::CreateDirectory));
        assert_eq!(registry.find_by_id("file-save"), Some(ActionKind::SaveFile));
        assert_eq!(registry.find_by_id("root-close"), Some(ActionKind::Unload));
        assert_eq!(registry.find_by_id("nonexistent"), None);
    }

    #[test]
    fn fuzzy_search_empty_query_returns_all() {
        let registry = ActionRegistry::new();
        assert_eq!(registry.fuzzy_search("").len(), registry.all().len());
    }

    #[test]
    fn fuzzy_search_finds_matching_actions() {
        let registry = ActionRegistry::new();
        let results = registry.fuzzy_search("folder");
        let kinds: Vec<ActionKind> = results.iter().map(|d| d.kind).collect();
        assert!(kinds.contains(&ActionKind::CreateDirectory));
        assert!(kinds.contains(&ActionKind::OpenRoot));
    }

    #[test]
    fn fuzzy_search_no_match() {
        let registry = ActionRegistry::new();
        assert!(registry.fuzzy_search("xyzxyzxyz").is_empty());
    }

    #[test]
    fn only_tree_edits_touch_disk() {
        assert!(ActionKind::Move.touches_disk());
        assert!(ActionKind::SaveFile.touches_disk());
        assert!(!ActionKind::Unload.touches_disk());
        assert!(!ActionKind::LoadContent.touches_disk());
    }

    #[test]
    fn kind_displays_id() {
        assert_eq!(ActionKind::OpenRoot.to_string(), "open-root");
        assert_eq!(ActionCategory::Roots.label(), "Roots");
    }
}
