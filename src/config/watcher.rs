//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file, so editors that save
//! by writing a temporary file and renaming it over the original are seen.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::IdsConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<IdsConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configurations that loaded and validated.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<IdsConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Load the file and forward it. An unreadable or invalid file is logged and dropped.
    pub fn reload(&self) -> bool {
        reload(&self.path, &self.update_tx)
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == path.file_name());
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!(path = %path.display(), "Config file change detected");
                        reload(&path, &tx);
                    }
                }
                Err(e) => tracing::error!(path = %path.display(), error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(watch_dir(&self.path), RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<IdsConfig>) -> bool {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(
                path = %path.display(),
                threshold = config.inspection.threshold,
                "Config reloaded"
            );
            tx.send(config).is_ok()
        }
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Config reload failed, keeping current configuration"
            );
            false
        }
    }
}
