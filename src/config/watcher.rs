//! Configuration file watcher for hot reload of route rules.
//!
//! The parent directory is watched rather than the file itself: editors
//! that save by writing a temp file and renaming it over the original
//! would otherwise detach the watch after the first save.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::DispatchConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<DispatchConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<DispatchConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let directory = watch_root(&self.path);
        let mut reloader = Reloader::new(self.path.clone(), self.update_tx);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => reloader.on_event(&event),
                Err(error) => tracing::error!(?error, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, directory = ?directory, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_root(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether `event` may have changed the file at `target`.
fn touches(event: &Event, target: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == target.file_name())
}

/// Turns file events into validated configurations, once per distinct content.
///
/// A single save usually fires several events; only the first one that sees
/// new bytes on disk triggers a reload.
struct Reloader {
    path: PathBuf,
    last: Option<String>,
    tx: mpsc::UnboundedSender<DispatchConfig>,
}

impl Reloader {
    fn new(path: PathBuf, tx: mpsc::UnboundedSender<DispatchConfig>) -> Self {
        let last = fs::read_to_string(&path).ok();
        Self { path, last, tx }
    }

    fn on_event(&mut self, event: &Event) {
        if !touches(event, &self.path) {
            return;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                // Mid-rename; the create event that follows reads it.
                tracing::debug!(path = ?self.path, %error, "Config file unreadable");
                return;
            }
        };
        if self.last.as_deref() == Some(content.as_str()) {
            tracing::trace!(path = ?self.path, "Config file unchanged, skipping reload");
            return;
        }

        tracing::info!(path = ?self.path, "Config file change detected, reloading");
        let parsed = parse_config(&content);
        self.last = Some(content);

        match parsed {
            Ok(config) => {
                if self.tx.send(config).is_err() {
                    tracing::debug!("Config receiver dropped, ignoring reload");
                }
            }
            Err(error) => {
                tracing::error!(%error, "Failed to reload config, keeping current rules");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, EventKind, ModifyKind};

    const ONE_RULE: &str = r#"
[[rules]]
pattern = "**/api/*"
action = "abort"
"#;

    fn modified(path: &Path) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(path.to_path_buf())
    }

    fn scratch_file(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("route-dispatch-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dispatch.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_touches_only_the_watched_file() {
        let target = Path::new("/etc/route-dispatch/dispatch.toml");

        assert!(touches(&modified(target), target));
        assert!(touches(
            &Event::new(EventKind::Create(CreateKind::File)).add_path(target.to_path_buf()),
            target
        ));
        assert!(!touches(
            &modified(Path::new("/etc/route-dispatch/.dispatch.toml.swp")),
            target
        ));
        assert!(!touches(
            &Event::new(EventKind::Access(AccessKind::Any)).add_path(target.to_path_buf()),
            target
        ));
    }

    #[test]
    fn test_watch_root_is_parent_directory() {
        assert_eq!(
            watch_root(Path::new("/etc/route-dispatch/dispatch.toml")),
            PathBuf::from("/etc/route-dispatch")
        );
        assert_eq!(watch_root(Path::new("dispatch.toml")), PathBuf::from("."));
    }

    #[test]
    fn test_reloads_once_per_distinct_content() {
        let path = scratch_file("");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reloader = Reloader::new(path.clone(), tx);

        // Unchanged since start.
        reloader.on_event(&modified(&path));
        assert!(rx.try_recv().is_err());

        fs::write(&path, ONE_RULE).unwrap();
        reloader.on_event(&modified(&path));
        reloader.on_event(&modified(&path));
        assert_eq!(rx.try_recv().unwrap().rules.len(), 1);
        assert!(rx.try_recv().is_err());

        // Invalid content is reported once and not sent.
        fs::write(&path, "[[rules]").unwrap();
        reloader.on_event(&modified(&path));
        assert!(rx.try_recv().is_err());

        fs::write(&path, "").unwrap();
        reloader.on_event(&modified(&path));
        assert!(rx.try_recv().unwrap().rules.is_empty());

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
