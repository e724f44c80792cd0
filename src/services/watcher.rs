//! Background watcher for Steam library directories.
//!
//! [`LibraryWatcher`] registers a non-recursive `notify` watch on each library
//! root and runs a dedicated thread that turns raw filesystem events into
//! [`ChangeEvent`]s for manifest files (`*.acf`). Everything else is dropped.
//!
//! The callback runs on the watcher thread. It should hand the event off (see
//! [`LibraryWatcher::with_channel`]) rather than run a sync pass inline, so that
//! passes stay serialized and slow passes don't hold up event delivery.
//!
//! Lifecycle: `Idle` → `Watching` → `Stopped`. A watcher whose notification
//! backend couldn't be created stays `Idle` and ignores every call.

use camino::{Utf8Path, Utf8PathBuf};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;

use crate::metrics::Metrics;

/// Suffix of Steam app manifest files.
pub const MANIFEST_SUFFIX: &str = ".acf";

/// Errors that prevent a watcher from starting.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Filesystem notifications unavailable: {0}")]
    Notify(#[from] notify::Error),

    #[error("Failed to spawn watcher thread: {0}")]
    Thread(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "CREATE"),
            ChangeKind::Modified => write!(f, "MODIFY"),
            ChangeKind::Deleted => write!(f, "DELETE"),
        }
    }
}

/// A create, modify or delete of a manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: Utf8PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Watching,
    Stopped,
}

/// Callback invoked on the watcher thread for each manifest change.
pub type OnChangeFn = Box<dyn Fn(ChangeEvent) + Send + 'static>;

enum LoopMessage {
    Fs(notify::Result<notify::Event>),
    Shutdown,
}

/// Watches library roots for manifest changes.
///
/// Dropping the watcher stops it.
pub struct LibraryWatcher {
    state: WatcherState,
    watcher: Option<RecommendedWatcher>,
    control: Option<mpsc::Sender<LoopMessage>>,
    thread: Option<JoinHandle<()>>,
}

impl LibraryWatcher {
    /// Start watching `roots`, calling `on_change` for every manifest event.
    ///
    /// Never fails: if notifications are unavailable the error is logged and
    /// an inert watcher is returned. Roots that can't be watched are logged
    /// and skipped.
    pub fn new<F>(roots: &[Utf8PathBuf], on_change: F) -> Self
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        match Self::start(roots, Box::new(on_change)) {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::error!("{}, Steam library changes won't be tracked", e);
                Self::inert()
            }
        }
    }

    /// Start watching `roots`, queueing events on a bounded channel.
    ///
    /// When the queue is full new events are dropped with a warning and counted
    /// in `metrics`.
    pub fn with_channel(
        roots: &[Utf8PathBuf],
        capacity: usize,
        metrics: Arc<Metrics>,
    ) -> (Self, tokio::sync::mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity.max(1));
        let watcher = Self::new(roots, move |event| {
            metrics.record_change_event();
            match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    metrics.record_change_event_dropped();
                    tracing::warn!(
                        "Change queue full, dropping {} event for {}",
                        event.kind,
                        event.path
                    );
                }
                Err(TrySendError::Closed(event)) => {
                    tracing::debug!("Change queue closed, ignoring event for {}", event.path);
                }
            }
        });
        (watcher, rx)
    }

    fn inert() -> Self {
        Self {
            state: WatcherState::Idle,
            watcher: None,
            control: None,
            thread: None,
        }
    }

    fn start(roots: &[Utf8PathBuf], on_change: OnChangeFn) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::channel();
        let fs_tx = tx.clone();

        let mut watcher = notify::recommended_watcher(move |result| {
            // The loop may already be gone during shutdown
            let _ = fs_tx.send(LoopMessage::Fs(result));
        })?;

        for root in roots {
            match watcher.watch(root.as_std_path(), RecursiveMode::NonRecursive) {
                Ok(()) => tracing::debug!("Watching Steam folder {}", root),
                Err(e) => tracing::warn!("Cannot watch Steam folder {}: {}", root, e),
            }
        }

        let thread = thread::Builder::new()
            .name("steamsync-watcher".to_string())
            .spawn(move || watch_loop(rx, on_change))
            .map_err(WatcherError::Thread)?;

        tracing::info!("Library watcher started on {} folder(s)", roots.len());
        Ok(Self {
            state: WatcherState::Watching,
            watcher: Some(watcher),
            control: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn is_watching(&self) -> bool {
        self.state == WatcherState::Watching
    }

    /// Stop watching and wait for the watcher thread to exit.
    ///
    /// No callback runs after this returns. Calling it again, or on a watcher
    /// that never started, does nothing.
    pub fn stop(&mut self) {
        if self.state != WatcherState::Watching {
            return;
        }
        self.state = WatcherState::Stopped;

        // Drop the notify backend first so no new events are queued behind Shutdown
        drop(self.watcher.take());
        if let Some(control) = self.control.take() {
            let _ = control.send(LoopMessage::Shutdown);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Library watcher thread panicked");
            }
        }

        tracing::info!("Library watcher stopped");
    }
}

impl Drop for LibraryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start a [`LibraryWatcher`] on `roots`.
pub fn watch_libraries<F>(roots: &[Utf8PathBuf], on_change: F) -> LibraryWatcher
where
    F: Fn(ChangeEvent) + Send + 'static,
{
    LibraryWatcher::new(roots, on_change)
}

fn watch_loop(rx: mpsc::Receiver<LoopMessage>, on_change: OnChangeFn) {
    while let Ok(message) = rx.recv() {
        match message {
            LoopMessage::Shutdown => break,
            LoopMessage::Fs(Ok(event)) => {
                for change in manifest_changes(&event) {
                    tracing::debug!("{} {}", change.kind, change.path);
                    on_change(change);
                }
            }
            LoopMessage::Fs(Err(e)) => tracing::warn!("Filesystem watch error: {}", e),
        }
    }
}

pub fn is_manifest_path(path: &Utf8Path) -> bool {
    path.as_str().ends_with(MANIFEST_SUFFIX)
}

/// Manifest changes carried by one raw filesystem event.
fn manifest_changes(event: &notify::Event) -> Vec<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter_map(|path| Utf8PathBuf::from_path_buf(path.clone()).ok())
        .filter(|path| is_manifest_path(path))
        .map(|path| ChangeEvent { kind, path })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use std::path::PathBuf;

    fn raw(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_event_kinds_are_mapped() {
        let created = manifest_changes(&raw(
            EventKind::Create(CreateKind::File),
            "/steamapps/appmanifest_1.acf",
        ));
        assert_eq!(
            created,
            vec![ChangeEvent {
                kind: ChangeKind::Created,
                path: Utf8PathBuf::from("/steamapps/appmanifest_1.acf"),
            }]
        );

        let modified = manifest_changes(&raw(
            EventKind::Modify(ModifyKind::Any),
            "/steamapps/appmanifest_1.acf",
        ));
        assert_eq!(modified[0].kind, ChangeKind::Modified);

        let deleted = manifest_changes(&raw(
            EventKind::Remove(RemoveKind::File),
            "/steamapps/appmanifest_1.acf",
        ));
        assert_eq!(deleted[0].kind, ChangeKind::Deleted);
    }

    #[test]
    fn test_non_manifest_paths_are_dropped() {
        let event = raw(
            EventKind::Create(CreateKind::File),
            "/steamapps/libraryfolders.vdf",
        );
        assert!(manifest_changes(&event).is_empty());
    }

    #[test]
    fn test_access_events_are_dropped() {
        let event = raw(
            EventKind::Access(AccessKind::Any),
            "/steamapps/appmanifest_1.acf",
        );
        assert!(manifest_changes(&event).is_empty());
    }

    #[test]
    fn test_inert_watcher_ignores_stop() {
        let mut watcher = LibraryWatcher::inert();
        assert_eq!(watcher.state(), WatcherState::Idle);
        watcher.stop();
        assert_eq!(watcher.state(), WatcherState::Idle);
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::Created.to_string(), "CREATE");
        assert_eq!(ChangeKind::Deleted.to_string(), "DELETE");
    }
}
