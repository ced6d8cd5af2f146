//! An in-memory [`DiskIo`] backend.
//!
//! Used by tests and by embedders that want a tree without touching real
//! storage. Failures can be injected per operation.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::fs::disk::DiskIo;
use crate::fs::entry::FileEntry;

/// Operations that can be made to fail with [`MemoryDisk::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiskOp {
    CreateDirectory,
    CreateFile,
    WriteFile,
    Delete,
    Rename,
    ReadFile,
    ReadDir,
    Stat,
}

#[derive(Debug, Clone)]
enum Entry {
    Dir {
        modified: SystemTime,
    },
    File {
        content: String,
        modified: SystemTime,
    },
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<PathBuf, Entry>,
    failing: HashSet<DiskOp>,
    mutations: usize,
}

#[derive(Debug, Default)]
pub struct MemoryDisk {
    inner: Mutex<Inner>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a directory, creating missing ancestors.
    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        {
            let mut inner = self.inner.lock();
            let path = path.into();
            for ancestor in path.ancestors() {
                if ancestor.as_os_str().is_empty() {
                    continue;
                }
                inner
                    .entries
                    .entry(ancestor.to_path_buf())
                    .or_insert(Entry::Dir {
                        modified: SystemTime::now(),
                    });
            }
        }
        self
    }

    /// Seeds a file, creating missing ancestor directories.
    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        let path = path.into();
        let this = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.with_dir(parent),
            _ => self,
        };
        this.inner.lock().entries.insert(
            path,
            Entry::File {
                content: content.to_owned(),
                modified: SystemTime::now(),
            },
        );
        this
    }

    /// Makes every later call of `op` fail until [`clear_failures`](Self::clear_failures).
    pub fn fail(&self, op: DiskOp) {
        self.inner.lock().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failing.clear();
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().entries.contains_key(path.as_ref())
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        matches!(
            self.inner.lock().entries.get(path.as_ref()),
            Some(Entry::Dir { .. })
        )
    }

    /// Content of a file, `None` for directories and missing paths.
    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        match self.inner.lock().entries.get(path.as_ref()) {
            Some(Entry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    /// Number of successful mutating calls so far.
    pub fn mutations(&self) -> usize {
        self.inner.lock().mutations
    }

    fn check(inner: &Inner, op: DiskOp) -> io::Result<()> {
        if inner.failing.contains(&op) {
            return Err(io::Error::other(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("already exists: {}", path.display()),
    )
}

fn entry_of(path: &Path, entry: &Entry) -> FileEntry {
    match entry {
        Entry::Dir { modified } => FileEntry::from_parts(path.to_path_buf(), true, 0, Some(*modified)),
        Entry::File { content, modified } => FileEntry::from_parts(
            path.to_path_buf(),
            false,
            content.len() as u64,
            Some(*modified),
        ),
    }
}

impl Inner {
    fn require_parent_dir(&self, path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => match self.entries.get(parent) {
                Some(Entry::Dir { .. }) => Ok(()),
                Some(Entry::File { .. }) => Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a directory: {}", parent.display()),
                )),
                None => Err(not_found(parent)),
            },
            _ => Ok(()),
        }
    }

    /// `path` and everything below it. Paths order component-wise, so the
    /// subtree is one contiguous range.
    fn subtree_paths(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .range(path.to_path_buf()..)
            .map(|(p, _)| p)
            .take_while(|p| p.starts_with(path))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DiskIo for MemoryDisk {
    async fn create_directory(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.inner.lock();
        Self::check(&inner, DiskOp::CreateDirectory)?;
        if inner.entries.contains_key(path) {
            return Err(already_exists(path));
        }
        inner.require_parent_dir(path)?;
        inner.entries.insert(
            path.to_path_buf(),
            Entry::Dir {
                modified: SystemTime::now(),
            },
        );
        inner.mutations += 1;
        Ok(())
    }

    async fn create_file(&self, path: &Path, content: &str) -> io::Result<FileEntry> {
        let mut inner = self.inner.lock();
        Self::check(&inner, DiskOp::CreateFile)?;
        if inner.entries.contains_key(path) {
            return Err(already_exists(path));
        }
        inner.require_parent_dir(path)?;
        let entry = Entry::File {
            content: content.to_owned(),
            modified: SystemTime::now(),
        };
        let out = entry_of(path, &entry);
        inner.entries.insert(path.to_path_buf(), entry);
        inner.mutations += 1;
        Ok(out)
    }

    async fn write_file(&self, path: &Path, content: &str) -> io::Result<FileEntry> {
        let mut inner = self.inner.lock();
        Self::check(&inner, DiskOp::WriteFile)?;
        match inner.entries.get(path) {
            Some(Entry::File { .. }) => {}
            Some(Entry::Dir { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot write file content to a directory",
                ))
            }
            None => return Err(not_found(path)),
        }
        let entry = Entry::File {
            content: content.to_owned(),
            modified: SystemTime::now(),
        };
        let out = entry_of(path, &entry);
        inner.entries.insert(path.to_path_buf(), entry);
        inner.mutations += 1;
        Ok(out)
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.inner.lock();
        Self::check(&inner, DiskOp::Delete)?;
        if !inner.entries.contains_key(path) {
            return Err(not_found(path));
        }
        for doomed in inner.subtree_paths(path) {
            inner.entries.remove(&doomed);
        }
        inner.mutations += 1;
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut inner = self.inner.lock();
        Self::check(&inner, DiskOp::Rename)?;
        if !inner.entries.contains_key(from) {
            return Err(not_found(from));
        }
        if inner.entries.contains_key(to) {
            return Err(already_exists(to));
        }
        if to.starts_with(from) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot move a directory into itself",
            ));
        }
        inner.require_parent_dir(to)?;

        for old in inner.subtree_paths(from) {
            if let Some(entry) = inner.entries.remove(&old) {
                let rest = old.strip_prefix(from).unwrap_or(Path::new(""));
                let new = if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                };
                inner.entries.insert(new, entry);
            }
        }
        inner.mutations += 1;
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> io::Result<String> {
        let inner = self.inner.lock();
        Self::check(&inner, DiskOp::ReadFile)?;
        match inner.entries.get(path) {
            Some(Entry::File { content, .. }) => Ok(content.clone()),
            Some(Entry::Dir { .. }) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "is a directory",
            )),
            None => Err(not_found(path)),
        }
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileEntry>> {
        let inner = self.inner.lock();
        Self::check(&inner, DiskOp::ReadDir)?;
        match inner.entries.get(path) {
            Some(Entry::Dir { .. }) => {}
            Some(Entry::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a directory: {}", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }
        Ok(inner
            .entries
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, e)| entry_of(p, e))
            .collect())
    }

    async fn stat(&self, path: &Path) -> io::Result<FileEntry> {
        let inner = self.inner.lock();
        Self::check(&inner, DiskOp::Stat)?;
        inner
            .entries
            .get(path)
            .map(|e| entry_of(path, e))
            .ok_or_else(|| not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk() -> MemoryDisk {
        MemoryDisk::new()
            .with_file("/docs/a.md", "alpha")
            .with_file("/docs/notes/b.md", "beta")
            .with_dir("/docs/empty")
    }

    #[tokio::test]
    async fn seeding_creates_ancestors() {
        let disk = disk();
        assert!(disk.is_dir("/docs"));
        assert!(disk.is_dir("/docs/notes"));
        assert_eq!(disk.content("/docs/notes/b.md").as_deref(), Some("beta"));
        assert_eq!(disk.mutations(), 0);
    }

    #[tokio::test]
    async fn create_requires_parent() {
        let disk = disk();
        let err = disk
            .create_file(Path::new("/docs/missing/x.md"), "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        disk.create_file(Path::new("/docs/c.md"), "gamma").await.unwrap();
        assert_eq!(disk.content("/docs/c.md").as_deref(), Some("gamma"));
        assert_eq!(disk.mutations(), 1);
    }

    #[tokio::test]
    async fn create_existing_is_already_exists() {
        let disk = disk();
        let err = disk
            .create_directory(Path::new("/docs/notes"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn delete_removes_descendants_only() {
        let disk = disk().with_file("/docs/notes-extra.md", "x");
        disk.delete(Path::new("/docs/notes")).await.unwrap();
        assert!(!disk.exists("/docs/notes"));
        assert!(!disk.exists("/docs/notes/b.md"));
        assert!(disk.exists("/docs/notes-extra.md"));
        assert!(disk.exists("/docs/a.md"));
    }

    #[tokio::test]
    async fn rename_moves_descendants() {
        let disk = disk();
        disk.rename(Path::new("/docs/notes"), Path::new("/docs/empty/notes"))
            .await
            .unwrap();
        assert!(!disk.exists("/docs/notes/b.md"));
        assert_eq!(
            disk.content("/docs/empty/notes/b.md").as_deref(),
            Some("beta")
        );
    }

    #[tokio::test]
    async fn rename_into_itself_is_refused() {
        let disk = disk();
        assert!(disk
            .rename(Path::new("/docs/notes"), Path::new("/docs/notes/inner"))
            .await
            .is_err());
        assert!(disk.exists("/docs/notes/b.md"));
    }

    #[tokio::test]
    async fn read_dir_lists_direct_children() {
        let disk = disk();
        let mut names: Vec<String> = disk
            .read_dir(Path::new("/docs"))
            .await
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.md", "empty", "notes"]);
    }

    #[tokio::test]
    async fn injected_failures_leave_state_alone() {
        let disk = disk();
        disk.fail(DiskOp::WriteFile);
        assert!(disk.write_file(Path::new("/docs/a.md"), "new").await.is_err());
        assert_eq!(disk.content("/docs/a.md").as_deref(), Some("alpha"));

        disk.clear_failures();
        disk.write_file(Path::new("/docs/a.md"), "new").await.unwrap();
        assert_eq!(disk.content("/docs/a.md").as_deref(), Some("new"));
    }
}
