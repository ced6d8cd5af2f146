//! Live configuration shared between the executor and its embedder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::settings::Config;
use crate::error::CoreResult;

/// Holds the current [`Config`] and announces replacements.
///
/// Readers get a cheap `Arc` clone; subscribers are woken through a
/// `watch` channel whenever the config is replaced.
#[derive(Debug)]
pub struct ConfigStore {
    tx: watch::Sender<Arc<Config>>,
    source: Option<PathBuf>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self { tx, source: None }
    }

    /// Loads `path` and remembers it for [`reload`](Self::reload).
    pub fn load(path: &Path) -> CoreResult<Self> {
        let config = Config::load(path)?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            ..Self::new(config)
        })
    }

    pub fn current(&self) -> Arc<Config> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn replace(&self, config: Config) {
        self.tx.send_replace(Arc::new(config));
        tracing::debug!("configuration replaced");
    }

    /// Re-reads the file the store was loaded from. A store built with
    /// [`new`](Self::new) has nothing to reload and keeps its config.
    pub fn reload(&self) -> CoreResult<()> {
        if let Some(path) = &self.source {
            self.replace(Config::load(path)?);
        }
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.tx.subscribe()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
