//! Disk primitives used by the action layer.
//!
//! [`DiskIo`] is the only place the core touches storage. [`LocalDisk`]
//! runs every operation on tokio's blocking pool; a blocking task that is
//! cancelled or panics is reported as an ordinary `io::Error`, so callers
//! never see anything but `io::Result`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::fs::entry::FileEntry;

/// Storage backend for the tree.
#[async_trait]
pub trait DiskIo: Send + Sync {
    /// Creates a single directory. Fails if it already exists.
    async fn create_directory(&self, path: &Path) -> io::Result<()>;

    /// Creates a new file with `content`. Fails if it already exists.
    async fn create_file(&self, path: &Path, content: &str) -> io::Result<FileEntry>;

    /// Overwrites an existing file.
    async fn write_file(&self, path: &Path, content: &str) -> io::Result<FileEntry>;

    /// Deletes a file, or a directory with everything in it.
    async fn delete(&self, path: &Path) -> io::Result<()>;

    /// Moves `from` to `to`. Fails if `to` already exists.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Immediate children of a directory, unsorted.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileEntry>>;

    async fn stat(&self, path: &Path) -> io::Result<FileEntry>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDisk;

impl LocalDisk {
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(op: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| io::Error::other(format!("disk task did not complete: {e}")))?
}

#[async_trait]
impl DiskIo for LocalDisk {
    async fn create_directory(&self, path: &Path) -> io::Result<()> {
        let path = path.to_path_buf();
        blocking(move || std::fs::create_dir(&path)).await
    }

    async fn create_file(&self, path: &Path, content: &str) -> io::Result<FileEntry> {
        let path = path.to_path_buf();
        let content = content.to_owned();
        blocking(move || {
            use std::io::Write;

            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            stat_path(&path)
        })
        .await
    }

    async fn write_file(&self, path: &Path, content: &str) -> io::Result<FileEntry> {
        let path = path.to_path_buf();
        let content = content.to_owned();
        blocking(move || {
            let meta = std::fs::symlink_metadata(&path)?;
            if meta.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot write file content to a directory",
                ));
            }
            std::fs::write(&path, content)?;
            stat_path(&path)
        })
        .await
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        let path = path.to_path_buf();
        blocking(move || delete_path(&path)).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from = from.to_path_buf();
        let to = to.to_path_buf();
        blocking(move || move_path(&from, &to)).await
    }

    async fn read_file(&self, path: &Path) -> io::Result<String> {
        let path = path.to_path_buf();
        blocking(move || std::fs::read_to_string(&path)).await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileEntry>> {
        let path = path.to_path_buf();
        blocking(move || read_directory(&path)).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileEntry> {
        let path = path.to_path_buf();
        blocking(move || stat_path(&path)).await
    }
}

fn stat_path(path: &Path) -> io::Result<FileEntry> {
    let meta = std::fs::metadata(path)?;
    Ok(FileEntry::new(path.to_path_buf(), &meta))
}

fn read_directory(path: &Path) -> io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(path)? {
        let dir_entry = match dir_entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        // DirEntry::metadata does not follow symlinks.
        let metadata = match dir_entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        entries.push(FileEntry::new(dir_entry.path(), &metadata));
    }
    Ok(entries)
}

fn delete_path(path: &Path) -> io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

fn move_path(from: &Path, to: &Path) -> io::Result<()> {
    relocate(from, to, |from, to| std::fs::rename(from, to))
}

/// Moves `from` to `to` with `rename`, copying instead only when the two
/// paths are on different devices.
fn relocate<R>(from: &Path, to: &Path, rename: R) -> io::Result<()>
where
    R: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let source = std::fs::symlink_metadata(from)?;
    if let Ok(dest) = std::fs::symlink_metadata(to) {
        // A case-only rename on a case-insensitive filesystem finds itself.
        if !same_entry(from, &source, to, &dest) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination exists: {}", to.display()),
            ));
        }
    }

    match rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => copy_then_delete(from, to),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
const CROSS_DEVICE: Option<i32> = Some(18); // EXDEV
#[cfg(windows)]
const CROSS_DEVICE: Option<i32> = Some(17); // ERROR_NOT_SAME_DEVICE
#[cfg(not(any(unix, windows)))]
const CROSS_DEVICE: Option<i32> = None;

fn is_cross_device(err: &io::Error) -> bool {
    CROSS_DEVICE.is_some() && err.raw_os_error() == CROSS_DEVICE
}

#[cfg(unix)]
fn same_entry(_from: &Path, a: &std::fs::Metadata, _to: &Path, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_entry(from: &Path, _a: &std::fs::Metadata, to: &Path, _b: &std::fs::Metadata) -> bool {
    match (std::fs::canonicalize(from), std::fs::canonicalize(to)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn copy_then_delete(from: &Path, to: &Path) -> io::Result<()> {
    if let Err(e) = copy_path(from, to, 0) {
        if let Err(cleanup) = delete_path(to) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %to.display(),
                    error = %cleanup,
                    "could not remove partial copy"
                );
            }
        }
        return Err(e);
    }

    delete_path(from).map_err(|e| {
        tracing::warn!(
            from = %from.display(),
            to = %to.display(),
            error = %e,
            "copied across devices but the source is still there"
        );
        io::Error::new(
            e.kind(),
            format!("copied to {} but could not remove {}: {e}", to.display(), from.display()),
        )
    })
}

/// Maximum recursion depth for cross-device copies.
const MAX_COPY_DEPTH: usize = 64;

fn copy_path(src: &Path, dest: &Path, depth: usize) -> io::Result<()> {
    if depth > MAX_COPY_DEPTH {
        return Err(io::Error::other(format!(
            "maximum recursion depth ({MAX_COPY_DEPTH}) exceeded during copy"
        )));
    }

    let meta = std::fs::symlink_metadata(src)?;
    if meta.is_symlink() {
        let target: PathBuf = std::fs::read_link(src)?;
        #[cfg(unix)]
        return std::os::unix::fs::symlink(&target, dest);
        #[cfg(not(unix))]
        return std::fs::copy(&target, dest).map(|_| ());
    }
    if !meta.is_dir() {
        return std::fs::copy(src, dest).map(|_| ());
    }

    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        copy_path(&entry.path(), &dest.join(entry.file_name()), depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_directory_and_file() {
        let tmp = TempDir::new().unwrap();
        let disk = LocalDisk::new();
        let dir = tmp.path().join("notes");

        disk.create_directory(&dir).await.unwrap();
        let entry = disk.create_file(&dir.join("a.md"), "hello").await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(entry.size(), 5);
        assert_eq!(fs::read_to_string(dir.join("a.md")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn create_existing_fails() {
        let tmp = TempDir::new().unwrap();
        let disk = LocalDisk::new();
        fs::write(tmp.path().join("a.md"), "x").unwrap();

        let err = disk
            .create_file(&tmp.path().join("a.md"), "y")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(tmp.path().join("a.md")).unwrap(), "x");

        let err = disk.create_directory(tmp.path()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn write_file_overwrites() {
        let tmp = TempDir::new().unwrap();
        let disk = LocalDisk::new();
        let path = tmp.path().join("a.md");
        fs::write(&path, "old").unwrap();

        let entry = disk.write_file(&path, "new content").await.unwrap();
        assert_eq!(entry.size(), 11);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new content");
    }

    #[tokio::test]
    async fn write_file_into_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let disk = LocalDisk::new();
        assert!(disk.write_file(tmp.path(), "x").await.is_err());
    }

    #[tokio::test]
    async fn delete_directory_recursively() {
        let tmp = TempDir::new().unwrap();
        let disk = LocalDisk::new();
        let dir = tmp.path().join("notes");
        fs::create_dir_all(dir.join("inner")).unwrap();
        fs::write(dir.join("inner/a.md"), "x").unwrap();

        disk.delete(&dir).await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn delete_missing_fails() {
        let tmp = TempDir::new().unwrap();
        let err = LocalDisk::new()
            .delete(&tmp.path().join("nope"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn rename_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let disk = LocalDisk::new();
        fs::write(tmp.path().join("a.md"), "a").unwrap();
        fs::write(tmp.path().join("b.md"), "b").unwrap();

        let err = disk
            .rename(&tmp.path().join("a.md"), &tmp.path().join("b.md"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(tmp.path().join("b.md")).unwrap(), "b");
    }

    #[tokio::test]
    async fn rename_moves_directory_contents() {
        let tmp = TempDir::new().unwrap();
        let disk = LocalDisk::new();
        fs::create_dir(tmp.path().join("notes")).unwrap();
        fs::write(tmp.path().join("notes/a.md"), "a").unwrap();

        disk.rename(&tmp.path().join("notes"), &tmp.path().join("archive"))
            .await
            .unwrap();
        assert!(tmp.path().join("archive/a.md").exists());
        assert!(!tmp.path().join("notes").exists());
    }

    #[tokio::test]
    async fn read_dir_lists_children() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "a").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let entries = LocalDisk::new().read_dir(tmp.path()).await.unwrap();
        let mut names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a.md", "sub"]);
    }

    fn raw_error(code: Option<i32>) -> io::Error {
        match code {
            Some(code) => io::Error::from_raw_os_error(code),
            None => io::Error::other("cross-device"),
        }
    }

    #[test]
    fn failed_rename_does_not_fall_back_to_copy() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("a.md");
        let to = tmp.path().join("b.md");
        fs::write(&from, "a").unwrap();

        let err = relocate(&from, &to, |_, _| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        })
        .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(from.exists());
        assert!(!to.exists());
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn cross_device_rename_copies_then_deletes() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("notes");
        let to = tmp.path().join("archive");
        fs::create_dir(&from).unwrap();
        fs::write(from.join("a.md"), "a").unwrap();

        relocate(&from, &to, |_, _| Err(raw_error(CROSS_DEVICE))).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(to.join("a.md")).unwrap(), "a");
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn failed_cross_device_copy_leaves_no_partial_destination() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("deep");
        let mut leaf = from.clone();
        for _ in 0..=MAX_COPY_DEPTH {
            leaf.push("d");
        }
        fs::create_dir_all(&leaf).unwrap();
        let to = tmp.path().join("copy");

        assert!(relocate(&from, &to, |_, _| Err(raw_error(CROSS_DEVICE))).is_err());

        assert!(from.join("d").is_dir());
        assert!(!to.exists());
    }

    #[test]
    fn renaming_onto_itself_is_not_a_collision() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.md");
        fs::write(&path, "a").unwrap();

        relocate(&path, &path, |_, _| Ok(())).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a");
    }

    #[test]
    fn copy_path_copies_nested_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("deep")).unwrap();
        fs::write(src.join("deep/x.md"), "x").unwrap();

        copy_path(&src, &tmp.path().join("dest"), 0).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("dest/deep/x.md")).unwrap(),
            "x"
        );
    }
}
