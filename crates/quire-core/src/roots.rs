//! The set of user-opened top-level paths.
//!
//! [`RootRegistry`] is the in-memory list; a [`RootStore`] persists it
//! between runs. Persistence is best-effort: a failing store is logged and
//! never fails the action that changed the registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::hasher::normalize_path;

/// Persists the list of open roots.
pub trait RootStore: Send + Sync {
    fn load(&self) -> CoreResult<Vec<PathBuf>>;
    fn save(&self, roots: &[PathBuf]) -> CoreResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RootsFile {
    #[serde(default)]
    roots: Vec<PathBuf>,
}

/// Stores roots as a TOML file:
///
/// ```toml
/// roots = ["/home/me/docs", "/home/me/papers"]
/// ```
#[derive(Debug, Clone)]
pub struct TomlRootStore {
    path: PathBuf,
}

impl TomlRootStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RootStore for TomlRootStore {
    /// A missing file means no roots have been opened yet.
    fn load(&self) -> CoreResult<Vec<PathBuf>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::io(&self.path, e)),
        };
        let file: RootsFile =
            toml::from_str(&content).map_err(|e| CoreError::ConfigParse(e.to_string()))?;
        Ok(file.roots)
    }

    /// Creates parent directories if they don't exist.
    fn save(&self, roots: &[PathBuf]) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let file = RootsFile {
            roots: roots.to_vec(),
        };
        let content =
            toml::to_string_pretty(&file).map_err(|e| CoreError::ConfigParse(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| CoreError::io(&self.path, e))
    }
}

impl<S: RootStore + ?Sized> RootStore for Arc<S> {
    fn load(&self) -> CoreResult<Vec<PathBuf>> {
        (**self).load()
    }

    fn save(&self, roots: &[PathBuf]) -> CoreResult<()> {
        (**self).save(roots)
    }
}

/// Keeps roots in memory only.
#[derive(Debug, Default)]
pub struct MemoryRootStore {
    roots: Mutex<Vec<PathBuf>>,
}

impl MemoryRootStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self {
            roots: Mutex::new(roots),
        }
    }

    /// What was last saved.
    pub fn saved(&self) -> Vec<PathBuf> {
        self.roots.lock().clone()
    }
}

impl RootStore for MemoryRootStore {
    fn load(&self) -> CoreResult<Vec<PathBuf>> {
        Ok(self.roots.lock().clone())
    }

    fn save(&self, roots: &[PathBuf]) -> CoreResult<()> {
        *self.roots.lock() = roots.to_vec();
        Ok(())
    }
}

pub struct RootRegistry {
    roots: Mutex<Vec<PathBuf>>,
    store: Box<dyn RootStore>,
}

impl std::fmt::Debug for RootRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootRegistry")
            .field("roots", &*self.roots.lock())
            .finish_non_exhaustive()
    }
}

impl RootRegistry {
    /// An empty registry backed by `store`. Nothing is read from the store.
    pub fn new(store: impl RootStore + 'static) -> Self {
        Self {
            roots: Mutex::new(Vec::new()),
            store: Box::new(store),
        }
    }

    /// A registry holding whatever `store` has persisted.
    pub fn load(store: impl RootStore + 'static) -> CoreResult<Self> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for path in store.load()? {
            if !roots.iter().any(|r| same_path(r, &path)) {
                roots.push(path);
            }
        }
        Ok(Self {
            roots: Mutex::new(roots),
            store: Box::new(store),
        })
    }

    /// Registers `path`. Returns `false` if it was already registered.
    pub fn add(&self, path: &Path) -> bool {
        let mut roots = self.roots.lock();
        if roots.iter().any(|r| same_path(r, path)) {
            return false;
        }
        roots.push(path.to_path_buf());
        self.persist(&roots);
        true
    }

    /// Unregisters `path`. Returns `false` if it was not registered.
    pub fn remove(&self, path: &Path) -> bool {
        let mut roots = self.roots.lock();
        let before = roots.len();
        roots.retain(|r| !same_path(r, path));
        if roots.len() == before {
            return false;
        }
        self.persist(&roots);
        true
    }

    /// Replaces `old` with `new`, keeping its position.
    pub fn rename(&self, old: &Path, new: &Path) -> bool {
        let mut roots = self.roots.lock();
        let Some(slot) = roots.iter_mut().find(|r| same_path(r, old)) else {
            return false;
        };
        *slot = new.to_path_buf();
        self.persist(&roots);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.roots.lock().iter().any(|r| same_path(r, path))
    }

    /// Registered paths in the order they were opened.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.roots.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.roots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.lock().is_empty()
    }

    fn persist(&self, roots: &[PathBuf]) {
        if let Err(e) = self.store.save(roots) {
            tracing::warn!(error = %e, "failed to persist open roots");
        }
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    normalize_path(a) == normalize_path(b)
}
