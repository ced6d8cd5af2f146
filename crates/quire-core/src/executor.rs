//! Atomic disk + tree actions.
//!
//! [`ActionExecutor::execute`] runs one [`Command`] as a unit: validate,
//! touch disk, then commit the matching tree mutation and publish
//! notifications. If the disk step fails the tree is never touched. Only
//! one action runs at a time; readers keep seeing the previous snapshot
//! until the commit swaps it.
//!
//! Each action runs on its own tokio task. Dropping the future returned by
//! `execute` stops the wait, not the action, so a disk change that has
//! started is always followed by its tree commit.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::action::ActionKind;
use crate::config::ConfigStore;
use crate::error::{CoreError, CoreResult};
use crate::event::{Command, Notification, UpdateBroadcaster};
use crate::fs::disk::DiskIo;
use crate::fs::sanitize::{FilenameGenerator, FilenameSanitizer, NameSanitizer, PatternFilenameGenerator};
use crate::fs::scan::scan_root;
use crate::hasher::{hash_path, NodeHash};
use crate::roots::{MemoryRootStore, RootRegistry};
use crate::tree::{renamed_path, DirectoryNode, FileNode, Node, Subtree, VirtualTree};

/// Caller state an action may read or update.
///
/// `modified` belongs to the caller's editor: it is cleared when a save
/// reaches disk and left alone otherwise. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    current_dir: Option<NodeHash>,
    modified: Arc<AtomicBool>,
}

impl ActionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory used for saves whose file is not in the tree.
    pub fn with_current_dir(mut self, dir: NodeHash) -> Self {
        self.current_dir = Some(dir);
        self
    }

    pub fn current_dir(&self) -> Option<NodeHash> {
        self.current_dir
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    pub fn mark_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    pub(crate) fn mark_persisted(&self) {
        self.modified.store(false, Ordering::Release);
    }
}

/// Result of a successful action.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The created, updated or relocated node as it now is in the tree.
    Node(Node),
    /// The subtree that was deleted or unloaded.
    Removed(Subtree),
    /// Nothing needed doing.
    Unchanged,
}

impl Outcome {
    pub fn node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Hash of the node the outcome is about, if any.
    pub fn hash(&self) -> Option<NodeHash> {
        match self {
            Self::Node(node) => Some(node.hash()),
            Self::Removed(subtree) => Some(subtree.root_hash()),
            Self::Unchanged => None,
        }
    }
}

/// Builder for [`ActionExecutor`]. Everything but the disk has a default.
pub struct ActionExecutorBuilder {
    disk: Arc<dyn DiskIo>,
    config: Option<Arc<ConfigStore>>,
    tree: Option<Arc<VirtualTree>>,
    roots: Option<Arc<RootRegistry>>,
    broadcaster: Option<Arc<UpdateBroadcaster>>,
    sanitizer: Option<Arc<dyn NameSanitizer>>,
    generator: Option<Arc<dyn FilenameGenerator>>,
}

impl ActionExecutorBuilder {
    pub fn config(mut self, config: Arc<ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn tree(mut self, tree: Arc<VirtualTree>) -> Self {
        self.tree = Some(tree);
        self
    }

    pub fn roots(mut self, roots: Arc<RootRegistry>) -> Self {
        self.roots = Some(roots);
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<UpdateBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Arc<dyn NameSanitizer>) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    /// Overrides the generator. Without one, names follow the configured
    /// `filename_pattern` at the time of each action.
    pub fn generator(mut self, generator: Arc<dyn FilenameGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> ActionExecutor {
        let config = self.config.unwrap_or_default();
        let current = config.current();
        let shared = Shared {
            tree: self.tree.unwrap_or_else(|| {
                Arc::new(VirtualTree::new(current.general.document_extensions.clone()))
            }),
            roots: self
                .roots
                .unwrap_or_else(|| Arc::new(RootRegistry::new(MemoryRootStore::new()))),
            broadcaster: self
                .broadcaster
                .unwrap_or_else(|| Arc::new(UpdateBroadcaster::new(current.events.channel_capacity))),
            disk: self.disk,
            sanitizer: self.sanitizer.unwrap_or_else(|| Arc::new(FilenameSanitizer::new())),
            generator: self.generator,
            config,
            gate: Mutex::new(()),
        };
        ActionExecutor {
            shared: Arc::new(shared),
        }
    }
}

/// Runs actions against one tree, one disk and one root registry.
pub struct ActionExecutor {
    shared: Arc<Shared>,
}

struct Shared {
    tree: Arc<VirtualTree>,
    roots: Arc<RootRegistry>,
    broadcaster: Arc<UpdateBroadcaster>,
    disk: Arc<dyn DiskIo>,
    config: Arc<ConfigStore>,
    sanitizer: Arc<dyn NameSanitizer>,
    generator: Option<Arc<dyn FilenameGenerator>>,
    gate: Mutex<()>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("roots", &self.shared.roots)
            .field("nodes", &self.shared.tree.snapshot().len())
            .finish_non_exhaustive()
    }
}

impl ActionExecutor {
    pub fn builder(disk: Arc<dyn DiskIo>) -> ActionExecutorBuilder {
        ActionExecutorBuilder {
            disk,
            config: None,
            tree: None,
            roots: None,
            broadcaster: None,
            sanitizer: None,
            generator: None,
        }
    }

    pub fn tree(&self) -> &Arc<VirtualTree> {
        &self.shared.tree
    }

    pub fn roots(&self) -> &Arc<RootRegistry> {
        &self.shared.roots
    }

    pub fn broadcaster(&self) -> &Arc<UpdateBroadcaster> {
        &self.shared.broadcaster
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.shared.broadcaster.subscribe()
    }

    /// Runs `command` to completion.
    ///
    /// Waits for any action already in flight. On error the tree is as it
    /// was before the call, except for the logged case where disk changed
    /// and the tree commit then failed. If the returned future is dropped
    /// the action still runs to completion in the background.
    pub async fn execute(&self, ctx: &ActionContext, command: Command) -> CoreResult<Outcome> {
        let shared = Arc::clone(&self.shared);
        let ctx = ctx.clone();
        finish(tokio::spawn(async move {
            let _gate = shared.gate.lock().await;
            shared.run(&ctx, command).await
        }))
        .await
    }

    /// Opens every root the registry's store remembers.
    ///
    /// Roots that cannot be scanned are logged and skipped; they stay in
    /// the registry so a later run can try again.
    pub async fn restore_roots(&self) -> Vec<NodeHash> {
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let _gate = shared.gate.lock().await;
            let mut opened = Vec::new();
            for path in shared.roots.paths() {
                match shared.open_root(&path).await {
                    Ok(outcome) => opened.extend(outcome.hash()),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "could not restore root")
                    }
                }
            }
            opened
        });
        match task.await {
            Ok(opened) => opened,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::warn!(error = %e, "restoring roots was interrupted");
                Vec::new()
            }
        }
    }
}

/// Waits for an action task, passing panics through to the caller.
async fn finish(task: JoinHandle<CoreResult<Outcome>>) -> CoreResult<Outcome> {
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(CoreError::Interrupted(e.to_string())),
    }
}

impl Shared {
    async fn run(&self, ctx: &ActionContext, command: Command) -> CoreResult<Outcome> {
        let kind = command.kind();
        let source = command.source();

        let result = match command {
            Command::CreateDirectory { parent, name } => self.create_directory(parent, &name).await,
            Command::CreateFile {
                parent,
                name,
                content,
            } => self.create_file(parent, name, &content).await,
            Command::SaveFile { file, content } => self.save_file(ctx, file, &content).await,
            Command::Rename { node, new_name } => self.rename(node, &new_name).await,
            Command::Move { node, target } => self.move_node(node, target).await,
            Command::Delete { node } => self.delete(node).await,
            Command::Unload { root } => self.unload(root),
            Command::OpenRoot { path } => self.open_root(&path).await,
            Command::LoadContent { file } => self.load_content(file).await,
        };

        match &result {
            Ok(outcome) => tracing::debug!(
                action = %kind,
                source = ?source,
                result = ?outcome.hash(),
                "action committed"
            ),
            Err(e) => tracing::debug!(action = %kind, source = ?source, error = %e, "action failed"),
        }
        result
    }

    async fn create_directory(&self, parent: NodeHash, raw_name: &str) -> CoreResult<Outcome> {
        let name = self.sanitize(raw_name)?;
        let parent_dir = self.resolve_dir(parent)?;
        let path = parent_dir.path().join(&name);
        self.ensure_vacant(&path)?;

        self.disk
            .create_directory(&path)
            .await
            .map_err(|e| disk_error(&path, e))?;

        let hash = self.commit(ActionKind::CreateDirectory, &path, || {
            self.tree
                .insert(Subtree::single(DirectoryNode::new(path.clone())), parent)
        })?;
        self.broadcaster.publish(&[Notification::dir(parent)]);
        self.committed(hash)
    }

    async fn create_file(
        &self,
        parent: NodeHash,
        name: Option<String>,
        content: &str,
    ) -> CoreResult<Outcome> {
        let raw_name = name.unwrap_or_else(|| self.generate_name());
        let name = self.sanitize(&raw_name)?;
        let parent_dir = self.resolve_dir(parent)?;
        let path = parent_dir.path().join(&name);
        self.ensure_vacant(&path)?;

        let entry = self
            .disk
            .create_file(&path, content)
            .await
            .map_err(|e| disk_error(&path, e))?;

        let mut node = FileNode::from_entry(&entry);
        node.record_content(content, entry.size(), entry.modified());
        let hash = self.commit(ActionKind::CreateFile, &path, || {
            self.tree.insert(Subtree::single(node), parent)
        })?;
        self.broadcaster.publish(&[Notification::dir(parent)]);
        self.committed(hash)
    }

    async fn save_file(&self, ctx: &ActionContext, file: NodeHash, content: &str) -> CoreResult<Outcome> {
        let node = match self.tree.find(file) {
            Some(Node::File(node)) => node,
            Some(Node::Directory(_)) => {
                return Err(CoreError::invariant(file, "cannot save content to a directory"))
            }
            None => {
                let Some(dir) = ctx.current_dir() else {
                    return Err(CoreError::NotFound(file));
                };
                let outcome = self.create_file(dir, None, content).await?;
                ctx.mark_persisted();
                return Ok(outcome);
            }
        };

        let entry = self
            .disk
            .write_file(node.path(), content)
            .await
            .map_err(|e| CoreError::io(node.path(), e))?;

        self.commit(ActionKind::SaveFile, node.path(), || {
            self.tree.update_file(file, |f| {
                f.record_content(content, entry.size(), entry.modified())
            })
        })?;
        ctx.mark_persisted();
        self.broadcaster.publish(&[Notification::file(file)]);
        self.committed(file)
    }

    async fn rename(&self, hash: NodeHash, raw_name: &str) -> CoreResult<Outcome> {
        let name = self.sanitize(raw_name)?;
        let node = self.tree.find(hash).ok_or(CoreError::NotFound(hash))?;
        if node.name() == name {
            return Ok(Outcome::Unchanged);
        }
        let new_path = renamed_path(node.path(), &name);
        self.ensure_vacant(&new_path)?;

        self.disk
            .rename(node.path(), &new_path)
            .await
            .map_err(|e| disk_error(&new_path, e))?;

        let new_hash = self.commit(ActionKind::Rename, &new_path, || {
            self.tree.rename_node(hash, &name)
        })?;
        if node.is_root() {
            self.roots.rename(node.path(), &new_path);
        }

        let renamed = self.committed(new_hash)?;
        let mut notifications: Vec<Notification> = node.parent().map(Notification::dir).into_iter().collect();
        notifications.extend(renamed.node().map(Notification::for_node));
        self.broadcaster.publish(&notifications);
        Ok(renamed)
    }

    async fn move_node(&self, hash: NodeHash, target: NodeHash) -> CoreResult<Outcome> {
        let snapshot = self.tree.snapshot();
        let node = snapshot.get(hash).ok_or(CoreError::NotFound(hash))?.clone();
        let target_dir = self.resolve_dir(target)?;

        let Some(old_parent) = node.parent() else {
            return Err(CoreError::invariant(hash, "roots cannot be moved"));
        };
        if snapshot.is_within(target, hash) {
            return Err(CoreError::invariant(
                hash,
                format!("cannot move into itself or its descendant {target}"),
            ));
        }
        if old_parent == target {
            return Ok(Outcome::Unchanged);
        }
        let new_path = target_dir.path().join(node.name());
        self.ensure_vacant(&new_path)?;

        self.disk
            .rename(node.path(), &new_path)
            .await
            .map_err(|e| disk_error(&new_path, e))?;

        let new_hash = self.commit(ActionKind::Move, &new_path, || {
            self.tree.move_node(hash, target)
        })?;
        let moved = self.committed(new_hash)?;
        let mut notifications = vec![Notification::dir(old_parent), Notification::dir(target)];
        notifications.extend(moved.node().map(Notification::for_node));
        self.broadcaster.publish(&notifications);
        Ok(moved)
    }

    async fn delete(&self, hash: NodeHash) -> CoreResult<Outcome> {
        let node = self.tree.find(hash).ok_or(CoreError::NotFound(hash))?;

        self.disk
            .delete(node.path())
            .await
            .map_err(|e| CoreError::io(node.path(), e))?;

        let removed = self.commit(ActionKind::Delete, node.path(), || self.tree.remove(hash))?;
        let notification = match node.parent() {
            Some(parent) => Notification::dir(parent),
            None => {
                self.roots.remove(node.path());
                Notification::for_node(&node)
            }
        };
        self.broadcaster.publish(&[notification]);
        Ok(Outcome::Removed(removed))
    }

    fn unload(&self, root: NodeHash) -> CoreResult<Outcome> {
        let Some(node) = self.tree.find(root) else {
            return Ok(Outcome::Unchanged);
        };
        if !node.is_root() {
            return Err(CoreError::invariant(root, "only roots can be unloaded"));
        }
        let removed = self.tree.remove(root)?;
        self.roots.remove(node.path());
        tracing::info!(path = %node.path().display(), "closed root");
        self.broadcaster.publish(&[Notification::for_node(&node)]);
        Ok(Outcome::Removed(removed))
    }

    async fn open_root(&self, path: &Path) -> CoreResult<Outcome> {
        if !path.is_absolute() {
            return Err(CoreError::validation(
                path.display().to_string(),
                "root paths must be absolute",
            ));
        }
        let hash = hash_path(path);
        if let Some(existing) = self.tree.find(hash) {
            if !existing.is_root() {
                return Err(CoreError::AlreadyExists {
                    path: path.to_path_buf(),
                    hash,
                });
            }
            self.roots.add(path);
            return Ok(Outcome::Node(existing));
        }

        let options = self.config.current().scan_options();
        let subtree = scan_root(self.disk.as_ref(), path, options).await?;
        let nodes = subtree.len();
        let root = self.commit(ActionKind::OpenRoot, path, || self.tree.insert_root(subtree))?;
        self.roots.add(path);
        tracing::info!(path = %path.display(), nodes, "opened root");

        let opened = self.committed(root)?;
        self.broadcaster
            .publish(&opened.node().map(Notification::for_node).into_iter().collect::<Vec<_>>());
        Ok(opened)
    }

    async fn load_content(&self, file: NodeHash) -> CoreResult<Outcome> {
        let node = self.resolve_file(file)?;
        if node.content().is_some() {
            return Ok(Outcome::Node(node.into()));
        }

        let content = self
            .disk
            .read_file(node.path())
            .await
            .map_err(|e| CoreError::io(node.path(), e))?;

        let updated = self.commit(ActionKind::LoadContent, node.path(), || {
            self.tree.update_file(file, |f| {
                f.record_content(&content, content.len() as u64, node.modified())
            })
        })?;
        self.broadcaster.publish(&[Notification::file(file)]);
        Ok(Outcome::Node(updated.into()))
    }

    fn sanitize(&self, raw: &str) -> CoreResult<String> {
        let config = self.config.current();
        let name = self.sanitizer.sanitize(raw, &config.general.replacement_char);
        if name.is_empty() {
            return Err(CoreError::validation(raw, "name is empty after removing unsafe characters"));
        }
        Ok(name)
    }

    fn generate_name(&self) -> String {
        match &self.generator {
            Some(generator) => generator.generate(),
            None => PatternFilenameGenerator::new(self.config.current().general.filename_pattern.clone())
                .generate(),
        }
    }

    fn resolve_dir(&self, hash: NodeHash) -> CoreResult<DirectoryNode> {
        match self.tree.find(hash) {
            Some(Node::Directory(dir)) => Ok(dir),
            Some(Node::File(_)) => Err(CoreError::invariant(hash, "not a directory")),
            None => Err(CoreError::NotFound(hash)),
        }
    }

    fn resolve_file(&self, hash: NodeHash) -> CoreResult<FileNode> {
        match self.tree.find(hash) {
            Some(Node::File(file)) => Ok(file),
            Some(Node::Directory(_)) => Err(CoreError::invariant(hash, "not a file")),
            None => Err(CoreError::NotFound(hash)),
        }
    }

    fn ensure_vacant(&self, path: &Path) -> CoreResult<()> {
        let hash = hash_path(path);
        if self.tree.snapshot().contains(hash) {
            return Err(CoreError::AlreadyExists {
                path: path.to_path_buf(),
                hash,
            });
        }
        Ok(())
    }

    /// Applies the tree half of an action whose disk half already
    /// succeeded. A failure here means disk and tree disagree.
    fn commit<T, F>(&self, kind: ActionKind, path: &Path, mutate: F) -> CoreResult<T>
    where
        F: FnOnce() -> CoreResult<T>,
    {
        mutate().inspect_err(|e| {
            tracing::warn!(
                action = %kind,
                path = %path.display(),
                error = %e,
                "disk changed but the tree could not be updated"
            )
        })
    }

    fn committed(&self, hash: NodeHash) -> CoreResult<Outcome> {
        self.tree
            .find(hash)
            .map(Outcome::Node)
            .ok_or(CoreError::NotFound(hash))
    }
}

fn disk_error(path: &Path, err: io::Error) -> CoreError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        return CoreError::AlreadyExists {
            path: PathBuf::from(path),
            hash: hash_path(path),
        };
    }
    CoreError::io(path, err)
}
