//! Configuration file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RegistryConfig;

/// Watches the configuration file and forwards each new valid version.
pub struct ConfigWatcher {
    path: PathBuf,
    current: RegistryConfig,
    update_tx: mpsc::UnboundedSender<RegistryConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    ///
    /// `current` is the configuration already in effect; reloads that parse
    /// to the same value are not forwarded.
    pub fn new(
        path: &Path,
        current: RegistryConfig,
    ) -> (Self, mpsc::UnboundedReceiver<RegistryConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher {
            path,
            mut current,
            update_tx,
        } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }

                reload(&path, &mut current, &update_tx);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}

/// What a single reload attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    Unchanged,
    Applied,
    ReceiverClosed,
    Failed,
}

/// Re-read `path` and forward it when it differs from `current`.
fn reload(
    path: &Path,
    current: &mut RegistryConfig,
    update_tx: &mpsc::UnboundedSender<RegistryConfig>,
) -> Reload {
    match load_config(path) {
        Ok(new_config) if new_config == *current => {
            tracing::debug!("Config file touched without changes");
            Reload::Unchanged
        }
        Ok(new_config) => {
            tracing::info!(path = ?path, "Config file changed, applying reload");
            *current = new_config.clone();
            if update_tx.send(new_config).is_err() {
                tracing::debug!("Config update receiver closed, dropping reload");
                return Reload::ReceiverClosed;
            }
            Reload::Applied
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                "Failed to reload config, keeping current configuration"
            );
            Reload::Failed
        }
    }
}
