//! Commands in, notifications out.
//!
//! A frontend turns user input into a [`Command`] and hands it to the
//! [`ActionExecutor`](crate::executor::ActionExecutor). After the action
//! commits, the [`UpdateBroadcaster`] tells every subscriber which hashes
//! changed; subscribers re-resolve those hashes through the tree.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::action::ActionKind;
use crate::hasher::NodeHash;
use crate::tree::Node;

/// An action the UI requests the core to perform.
///
/// Commands flow **UI → Core** and are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create directory `name` inside `parent`.
    CreateDirectory { parent: NodeHash, name: String },
    /// Create a file inside `parent`. A missing name is generated.
    CreateFile {
        parent: NodeHash,
        name: Option<String>,
        content: String,
    },
    /// Overwrite the content of `file`.
    SaveFile { file: NodeHash, content: String },
    Rename { node: NodeHash, new_name: String },
    /// Move `node` into directory `target`.
    Move { node: NodeHash, target: NodeHash },
    Delete { node: NodeHash },
    /// Stop showing a root. Disk is not touched.
    Unload { root: NodeHash },
    /// Scan `path` and show it as a new root.
    OpenRoot { path: PathBuf },
    /// Read the content of `file` from disk.
    LoadContent { file: NodeHash },
}

impl Command {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::CreateDirectory { .. } => ActionKind::CreateDirectory,
            Self::CreateFile { .. } => ActionKind::CreateFile,
            Self::SaveFile { .. } => ActionKind::SaveFile,
            Self::Rename { .. } => ActionKind::Rename,
            Self::Move { .. } => ActionKind::Move,
            Self::Delete { .. } => ActionKind::Delete,
            Self::Unload { .. } => ActionKind::Unload,
            Self::OpenRoot { .. } => ActionKind::OpenRoot,
            Self::LoadContent { .. } => ActionKind::LoadContent,
        }
    }

    /// The node the command acts on. `None` for [`Command::OpenRoot`],
    /// which names a path that is not in the tree yet.
    pub fn source(&self) -> Option<NodeHash> {
        match self {
            Self::CreateDirectory { parent, .. } | Self::CreateFile { parent, .. } => Some(*parent),
            Self::SaveFile { file, .. } | Self::LoadContent { file } => Some(*file),
            Self::Rename { node, .. } | Self::Move { node, .. } | Self::Delete { node } => Some(*node),
            Self::Unload { root } => Some(*root),
            Self::OpenRoot { .. } => None,
        }
    }
}

/// What kind of node a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Dir,
    File,
}

/// "Something at `hash` changed; look it up again."
///
/// Notifications flow **Core → UI** and carry nothing but the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    #[serde(serialize_with = "serialize_hash")]
    pub hash: NodeHash,
}

fn serialize_hash<S: serde::Serializer>(hash: &NodeHash, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(hash)
}

impl Notification {
    pub fn dir(hash: NodeHash) -> Self {
        Self {
            kind: NotificationKind::Dir,
            hash,
        }
    }

    pub fn file(hash: NodeHash) -> Self {
        Self {
            kind: NotificationKind::File,
            hash,
        }
    }

    pub fn for_node(node: &Node) -> Self {
        if node.is_dir() {
            Self::dir(node.hash())
        } else {
            Self::file(node.hash())
        }
    }
}

/// Synchronous receiver of notifications.
///
/// Sinks run on the executor's task right after an action commits, so
/// they must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Fans notifications out to channel subscribers and attached sinks.
pub struct UpdateBroadcaster {
    tx: broadcast::Sender<Notification>,
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
}

impl std::fmt::Debug for UpdateBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateBroadcaster")
            .field("subscribers", &self.tx.receiver_count())
            .field("sinks", &self.sinks.read().len())
            .finish()
    }
}

impl UpdateBroadcaster {
    /// `capacity` is how many notifications a slow subscriber may fall
    /// behind before it sees `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn attach(&self, sink: Arc<dyn NotificationSink>) {
        self.sinks.write().push(sink);
    }

    /// Sends each distinct notification once, in first-seen order.
    pub fn publish(&self, notifications: &[Notification]) {
        let mut sent: Vec<Notification> = Vec::with_capacity(notifications.len());
        for notification in notifications {
            if sent.contains(notification) {
                continue;
            }
            sent.push(*notification);
            // No receivers is not an error.
            let _ = self.tx.send(*notification);
            for sink in self.sinks.read().iter() {
                sink.notify(*notification);
            }
        }
        tracing::trace!(count = sent.len(), "published notifications");
    }
}

impl Default for UpdateBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationSink for UpdateBroadcaster {
    fn notify(&self, notification: Notification) {
        self.publish(&[notification]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_str;
    use parking_lot::Mutex;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Notification>>);

    impl NotificationSink for Recorder {
        fn notify(&self, notification: Notification) {
            self.0.lock().push(notification);
        }
    }

    #[test]
    fn command_kind_and_source() {
        let parent = hash_str("/docs");
        let cmd = Command::CreateDirectory {
            parent,
            name: "notes".into(),
        };
        assert_eq!(cmd.kind(), ActionKind::CreateDirectory);
        assert_eq!(cmd.source(), Some(parent));

        let open = Command::OpenRoot {
            path: PathBuf::from("/docs"),
        };
        assert_eq!(open.kind(), ActionKind::OpenRoot);
        assert_eq!(open.source(), None);
    }

    #[test]
    fn publish_dedupes_within_one_call() {
        let broadcaster = UpdateBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let docs = Notification::dir(hash_str("/docs"));
        let file = Notification::file(hash_str("/docs/a.md"));

        broadcaster.publish(&[docs, file, docs]);

        assert_eq!(rx.try_recv().unwrap(), docs);
        assert_eq!(rx.try_recv().unwrap(), file);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn sinks_receive_every_notification() {
        let broadcaster = UpdateBroadcaster::new(8);
        let recorder = Arc::new(Recorder::default());
        broadcaster.attach(recorder.clone());

        let docs = Notification::dir(hash_str("/docs"));
        broadcaster.publish(&[docs]);
        broadcaster.publish(&[docs]);

        assert_eq!(*recorder.0.lock(), vec![docs, docs]);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let broadcaster = UpdateBroadcaster::new(0);
        broadcaster.publish(&[Notification::dir(hash_str("/docs"))]);
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag() {
        let broadcaster = UpdateBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();
        for i in 0..5 {
            broadcaster.publish(&[Notification::file(hash_str(&format!("/docs/{i}.md")))]);
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn for_node_picks_kind() {
        use crate::tree::{DirectoryNode, FileNode};

        let dir = Node::from(DirectoryNode::new(PathBuf::from("/docs")));
        let file = Node::from(FileNode::new(PathBuf::from("/docs/a.md")));
        assert_eq!(Notification::for_node(&dir), Notification::dir(dir.hash()));
        assert_eq!(Notification::for_node(&file), Notification::file(file.hash()));
    }
}
