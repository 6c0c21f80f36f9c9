//! Config Hot-Reload - Poll config.toml for Changes
//!
//! Periodically re-reads config.toml and compares it with the last
//! loaded contents. If changes are detected, broadcasts the new config
//! via a `tokio::sync::watch` channel. The bot reconciler subscribes to
//! pick up added, changed and removed bots without a restart.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::AppConfig;

/// Watches config.toml for changes and broadcasts updates.
///
/// Polls rather than using a filesystem watcher, which has portability
/// issues across Linux/macOS/Docker volumes.
pub struct ConfigWatcher {
    /// Path to config.toml.
    config_path: String,
    /// Poll interval.
    interval: Duration,
    /// Watch channel sender for config updates.
    config_tx: watch::Sender<AppConfig>,
    /// Hash of the last loaded file contents.
    last_hash: Option<u64>,
}

impl ConfigWatcher {
    /// Create a new config watcher polling at the interval configured
    /// in `initial_config`.
    ///
    /// Returns the watcher and a `watch::Receiver` that consumers
    /// can use to get notified of config changes.
    pub fn new(config_path: &str, initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let interval = Duration::from_secs(initial_config.reload.interval_seconds.max(1));
        let (config_tx, config_rx) = watch::channel(initial_config);

        let watcher = Self {
            config_path: config_path.to_string(),
            interval,
            config_tx,
            last_hash: None,
        };

        (watcher, config_rx)
    }

    /// Run the config watcher loop until shutdown.
    #[instrument(skip(self, shutdown_rx), fields(path = %self.config_path))]
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(interval = ?self.interval, "Config watcher started");

        self.last_hash = self.compute_hash().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Config watcher shutting down");
                    return Ok(());
                }
                () = tokio::time::sleep(self.interval) => {
                    self.check_and_reload().await;
                }
            }
        }
    }

    /// Check if config has changed and reload if so.
    async fn check_and_reload(&mut self) {
        let new_hash = self.compute_hash().await;

        if new_hash == self.last_hash {
            debug!("Config unchanged");
            return;
        }

        info!("Config change detected, reloading");

        match super::loader::load_config(&self.config_path) {
            Ok(new_config) => {
                self.last_hash = new_hash;
                let interval = Duration::from_secs(new_config.reload.interval_seconds.max(1));
                if interval != self.interval {
                    info!(interval = ?interval, "Reload interval changed");
                    self.interval = interval;
                }
                if self.config_tx.send(new_config).is_err() {
                    warn!("No config subscribers, update dropped");
                } else {
                    info!("Config reloaded successfully");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload config, keeping current");
            }
        }
    }

    /// Hash of the config file contents, `None` if unreadable.
    async fn compute_hash(&self) -> Option<u64> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let content = tokio::fs::read_to_string(&self.config_path).await.ok()?;

        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Some(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{name}-{}.toml", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_detects_change_and_broadcasts() {
        let path = temp_path("hot-reload");
        std::fs::write(&path, "[reload]\ninterval_seconds = 1\n").unwrap();
        let path_str = path.to_string_lossy().to_string();

        let initial = parse_config("[reload]\ninterval_seconds = 1\n").unwrap();
        let (mut watcher, mut rx) = ConfigWatcher::new(&path_str, initial);
        watcher.last_hash = watcher.compute_hash().await;

        watcher.check_and_reload().await;
        assert!(!rx.has_changed().unwrap());

        std::fs::write(&path, "[reload]\ninterval_seconds = 2\n[service]\nname = \"changed\"\n").unwrap();
        watcher.check_and_reload().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().service.name, "changed");
        assert_eq!(watcher.interval, Duration::from_secs(2));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_invalid_change_keeps_current() {
        let path = temp_path("hot-reload-invalid");
        std::fs::write(&path, "").unwrap();
        let path_str = path.to_string_lossy().to_string();

        let (mut watcher, rx) = ConfigWatcher::new(&path_str, parse_config("").unwrap());
        watcher.last_hash = watcher.compute_hash().await;

        std::fs::write(&path, "[service]\nmarket_channel_capacity = 0\n").unwrap();
        watcher.check_and_reload().await;

        assert!(!rx.has_changed().unwrap());
        std::fs::remove_file(&path).ok();
    }
}
