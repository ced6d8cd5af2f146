//! Builds detached subtrees from what a [`DiskIo`] backend reports.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::fs::disk::DiskIo;
use crate::hasher::NodeHash;
use crate::tree::{DirectoryNode, FileNode, Subtree};

/// Deepest directory level a scan descends into.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Include entries whose name starts with `.`.
    pub show_hidden: bool,
    pub max_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Scans `path` into a parentless subtree.
///
/// `path` may be a directory or a single file. Subdirectories that cannot
/// be read are kept as empty directories and logged. Symlinks are never
/// followed.
pub async fn scan_root(disk: &dyn DiskIo, path: &Path, options: ScanOptions) -> CoreResult<Subtree> {
    let root_entry = disk.stat(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CoreError::PathNotFound(path.to_path_buf()),
        _ => CoreError::io(path, e),
    })?;

    if !root_entry.is_dir() {
        return Ok(Subtree::single(FileNode::from_entry(&root_entry)));
    }

    let mut subtree = Subtree::single(DirectoryNode::from_entry(&root_entry));
    let mut pending: Vec<(NodeHash, PathBuf, usize)> =
        vec![(subtree.root_hash(), path.to_path_buf(), 0)];

    while let Some((dir_hash, dir_path, depth)) = pending.pop() {
        let entries = match disk.read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if depth == 0 => return Err(CoreError::io(&dir_path, e)),
            Err(e) => {
                tracing::warn!(path = %dir_path.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries {
            if entry.is_hidden() && !options.show_hidden {
                continue;
            }
            if entry.is_dir() && !entry.is_symlink() {
                let hash = subtree.add_child(dir_hash, DirectoryNode::from_entry(&entry))?;
                if depth + 1 < options.max_depth {
                    pending.push((hash, entry.path().to_path_buf(), depth + 1));
                }
            } else {
                subtree.add_child(dir_hash, FileNode::from_entry(&entry))?;
            }
        }
    }

    tracing::debug!(path = %path.display(), nodes = subtree.len(), "scanned root");
    Ok(subtree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::disk::LocalDisk;
    use crate::fs::memory::{DiskOp, MemoryDisk};
    use crate::hasher::hash_path;
    use std::fs;
    use tempfile::TempDir;

    fn names(subtree: &Subtree, dir: NodeHash) -> Vec<String> {
        subtree
            .get(dir)
            .unwrap()
            .as_dir()
            .unwrap()
            .children()
            .iter()
            .map(|h| subtree.get(*h).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn scans_local_directory_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.md"), "one two").unwrap();
        fs::write(tmp.path().join("A.txt"), "").unwrap();
        fs::create_dir(tmp.path().join("notes")).unwrap();
        fs::write(tmp.path().join("notes/c.md"), "").unwrap();
        fs::write(tmp.path().join(".hidden"), "").unwrap();

        let sub = scan_root(&LocalDisk::new(), tmp.path(), ScanOptions::default())
            .await
            .unwrap();

        assert_eq!(sub.root_hash(), hash_path(tmp.path()));
        assert_eq!(names(&sub, sub.root_hash()), vec!["notes", "A.txt", "b.md"]);
        let notes = hash_path(&tmp.path().join("notes"));
        assert_eq!(names(&sub, notes), vec!["c.md"]);
        let b = sub.get(hash_path(&tmp.path().join("b.md"))).unwrap();
        assert_eq!(b.as_file().unwrap().size(), 7);
    }

    #[tokio::test]
    async fn hidden_entries_are_opt_in() {
        let disk = MemoryDisk::new()
            .with_file("/docs/.draft.md", "")
            .with_file("/docs/a.md", "");
        let options = ScanOptions {
            show_hidden: true,
            ..ScanOptions::default()
        };
        let sub = scan_root(&disk, Path::new("/docs"), options).await.unwrap();
        assert_eq!(names(&sub, sub.root_hash()), vec![".draft.md", "a.md"]);
    }

    #[tokio::test]
    async fn single_file_root() {
        let disk = MemoryDisk::new().with_file("/docs/a.md", "hi");
        let sub = scan_root(&disk, Path::new("/docs/a.md"), ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(sub.len(), 1);
        assert!(!sub.root().is_dir());
    }

    #[tokio::test]
    async fn missing_root_is_path_not_found() {
        let disk = MemoryDisk::new();
        let err = scan_root(&disk, Path::new("/nope"), ScanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn unreadable_root_is_io_error() {
        let disk = MemoryDisk::new().with_dir("/docs");
        disk.fail(DiskOp::ReadDir);
        let err = scan_root(&disk, Path::new("/docs"), ScanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }

    #[tokio::test]
    async fn depth_limit_stops_descent() {
        let disk = MemoryDisk::new().with_file("/r/a/b/c.md", "");
        let options = ScanOptions {
            max_depth: 1,
            ..ScanOptions::default()
        };
        let sub = scan_root(&disk, Path::new("/r"), options).await.unwrap();
        assert!(sub.contains(hash_path(Path::new("/r/a"))));
        assert!(!sub.contains(hash_path(Path::new("/r/a/b"))));
    }
}
