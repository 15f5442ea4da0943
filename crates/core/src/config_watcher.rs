use crate::config::AppConfig;
use crate::config_loader::ConfigSource;
use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tokio::sync::watch;

/// How often the blocking watch loop checks whether anyone is still listening.
const SUBSCRIBER_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Broadcasts console configuration, reloading it whenever the file changes.
pub struct ConfigWatcher {
    tx: watch::Sender<AppConfig>,
}

impl ConfigWatcher {
    /// Creates a watcher holding `initial_config`, plus a first receiver.
    #[must_use]
    pub fn new(initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        (Self { tx }, rx)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppConfig> {
        self.tx.subscribe()
    }

    /// Follows the files behind `source` and broadcasts every successful
    /// reload. The profile overlay and command-line overrides are applied on
    /// each reload, as they were at startup.
    ///
    /// Returns once every receiver has been dropped; callers normally spawn it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be watched or the blocking task panics.
    pub async fn watch(&self, source: ConfigSource) -> Result<()> {
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || follow(&source, &tx)).await??;
        Ok(())
    }
}

fn follow(source: &ConfigSource, tx: &watch::Sender<AppConfig>) -> Result<()> {
    let (events_tx, events) = mpsc::channel::<Event>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let _ = events_tx.send(event);
        }
    })?;
    for file in source.files().iter().filter(|file| file.exists()) {
        watcher.watch(file, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %file.display(), "Watching console config");
    }

    loop {
        match events.recv_timeout(SUBSCRIBER_CHECK_INTERVAL) {
            Ok(event) if event.kind.is_modify() => reload(source, tx),
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) if !tx.is_closed() => {}
            Err(_) => break,
        }
    }

    tracing::debug!(path = %source.path().display(), "Stopped watching console config");
    Ok(())
}

/// Rebuilds the config from `source` and publishes it if it differs from the
/// current value. A file that fails to parse keeps the previous config.
fn reload(source: &ConfigSource, tx: &watch::Sender<AppConfig>) {
    match source.load() {
        Ok(config) => {
            let changed = tx.send_if_modified(|current| {
                if *current == config {
                    return false;
                }
                *current = config;
                true
            });
            if changed {
                tracing::info!(path = %source.path().display(), "Console config reloaded");
            }
        }
        Err(e) => tracing::error!("Failed to reload console config: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_see_initial_config() {
        let mut initial = AppConfig::default();
        initial.polling.log_ms = 300;

        let (watcher, rx) = ConfigWatcher::new(initial.clone());
        let second = watcher.subscribe();

        assert_eq!(*rx.borrow(), initial);
        assert_eq!(second.borrow().polling.log_ms, 300);
    }

    #[test]
    fn test_reload_publishes_changes_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Console.toml");
        std::fs::write(&path, "[polling]\norders_ms = 8000\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(AppConfig::default());
        rx.mark_unchanged();

        reload(&ConfigSource::new(&path), &watcher.tx);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().polling.orders_ms, 8000);

        reload(&ConfigSource::new(&path), &watcher.tx);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_broken_file_keeps_previous_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Console.toml");
        std::fs::write(&path, "[polling\nnot toml").unwrap();

        let (watcher, rx) = ConfigWatcher::new(AppConfig::default());
        reload(&ConfigSource::new(&path), &watcher.tx);

        assert_eq!(*rx.borrow(), AppConfig::default());
    }

    #[test]
    fn test_reload_keeps_profile_and_url_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Console.toml");
        std::fs::write(&path, "[polling]\nstatus_ms = 1000\n").unwrap();
        std::fs::write(
            dir.path().join("Console.slow.toml"),
            "[polling]\nstatus_ms = 10000\n",
        )
        .unwrap();
        let source = ConfigSource::new(&path)
            .with_profile(Some("slow".to_string()))
            .with_base_url(Some("http://10.0.0.9:4567".to_string()));

        let (watcher, rx) = ConfigWatcher::new(source.load().unwrap());
        std::fs::write(&path, "[polling]\nstatus_ms = 1000\nlog_ms = 700\n").unwrap();
        reload(&source, &watcher.tx);

        let config = rx.borrow();
        assert_eq!(config.polling.log_ms, 700);
        assert_eq!(config.polling.status_ms, 10_000);
        assert_eq!(config.server.base_url, "http://10.0.0.9:4567");
    }
}
