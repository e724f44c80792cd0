// State management module
//
// SyncStateManager tracks what the sync loop is doing, using Arc<RwLock<T>>,
// and broadcasts change events to whoever is listening.

use crate::services::sync::SyncReport;
use crate::services::watcher::{ChangeEvent, ChangeKind};
use camino::Utf8PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Observable status of the sync loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// A pass is running
    pub is_syncing: bool,

    /// Another pass was requested while one was running
    pub sync_pending: bool,

    pub is_watching: bool,

    pub passes_completed: u64,

    pub last_report: Option<SyncReport>,

    /// Most recent manifest change seen by the watcher
    pub last_change: Option<ChangeEvent>,
}

/// Change events emitted when the status is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A pass was requested while another one was running
    SyncRequested,

    SyncStarted,

    SyncFinished {
        registered: usize,
        installed: usize,
        uninstalled: usize,
        skipped: usize,
    },

    /// The watcher reported a manifest change
    ManifestChanged {
        kind: ChangeKind,
        path: Utf8PathBuf,
    },

    WatcherChanged {
        watching: bool,
    },
}

/// Thread-safe sync status with event emission.
///
/// Passes are single-flight: [`try_begin_sync`](Self::try_begin_sync) refuses to
/// start a second pass and records that one is pending instead;
/// [`finish_sync`](Self::finish_sync) tells the caller whether to run again.
///
/// # Related Types
///
/// - [`SyncStatus`]: The underlying status structure
/// - [`crate::services::SyncEngine`]: Runs the passes this manager tracks
#[derive(Clone)]
pub struct SyncStateManager {
    state: Arc<RwLock<SyncStatus>>,

    /// Multiple subscribers can listen for status changes
    state_tx: broadcast::Sender<StateChange>,
}

impl SyncStateManager {
    /// Create a new manager with a broadcast buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(SyncStatus::default())),
            state_tx,
        }
    }

    /// Clone of the current status
    pub fn snapshot(&self) -> SyncStatus {
        self.read_lock().clone()
    }

    /// Execute a function with read access to the status
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SyncStatus) -> R,
    {
        f(&self.read_lock())
    }

    /// Apply `update_fn`, then emit an event for every detected change.
    ///
    /// Returns the emitted events.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut SyncStatus),
    {
        let mut state = self.write_lock();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = detect_changes(&old_state, &state);
        drop(state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Mark a pass as started.
    ///
    /// Returns `false` if one is already running; the request is then recorded
    /// as pending and picked up by [`finish_sync`](Self::finish_sync).
    pub fn try_begin_sync(&self) -> bool {
        let mut started = false;
        self.update(|state| {
            if state.is_syncing {
                state.sync_pending = true;
            } else {
                state.is_syncing = true;
                started = true;
            }
        });
        started
    }

    /// Mark the running pass as finished.
    ///
    /// Returns `true` if another pass was requested meanwhile; the caller should
    /// then run again. The manager stays in the syncing state in that case.
    pub fn finish_sync(&self, report: &SyncReport) -> bool {
        let mut run_again = false;
        self.update(|state| {
            state.passes_completed += 1;
            state.last_report = Some(report.clone());
            if state.sync_pending {
                state.sync_pending = false;
                run_again = true;
            } else {
                state.is_syncing = false;
            }
        });
        run_again
    }

    pub fn record_change(&self, event: &ChangeEvent) -> Vec<StateChange> {
        self.update(|state| state.last_change = Some(event.clone()))
    }

    pub fn set_watching(&self, watching: bool) -> Vec<StateChange> {
        self.update(|state| state.is_watching = watching)
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, SyncStatus> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, SyncStatus> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SyncStateManager {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_changes(old: &SyncStatus, new: &SyncStatus) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if !old.sync_pending && new.sync_pending {
        changes.push(StateChange::SyncRequested);
    }

    // A finished pass followed by an immediate rerun shows up as a new pass count
    if new.passes_completed != old.passes_completed {
        if let Some(report) = &new.last_report {
            changes.push(StateChange::SyncFinished {
                registered: report.registered.len(),
                installed: report.installed.len(),
                uninstalled: report.uninstalled.len(),
                skipped: report.skipped.len(),
            });
        }
    }

    if (!old.is_syncing && new.is_syncing)
        || (new.is_syncing && new.passes_completed != old.passes_completed)
    {
        changes.push(StateChange::SyncStarted);
    }

    if old.last_change != new.last_change {
        if let Some(event) = &new.last_change {
            changes.push(StateChange::ManifestChanged {
                kind: event.kind,
                path: event.path.clone(),
            });
        }
    }

    if old.is_watching != new.is_watching {
        changes.push(StateChange::WatcherChanged {
            watching: new.is_watching,
        });
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manager() {
        let manager = SyncStateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_syncing);
        assert!(!state.is_watching);
        assert_eq!(state.passes_completed, 0);
        assert!(state.last_report.is_none());
    }

    #[test]
    fn test_single_flight() {
        let manager = SyncStateManager::new();

        assert!(manager.try_begin_sync());
        assert!(!manager.try_begin_sync());
        assert!(!manager.try_begin_sync());
        assert!(manager.read(|s| s.sync_pending));

        // One rerun covers both requests
        assert!(manager.finish_sync(&SyncReport::default()));
        assert!(manager.read(|s| s.is_syncing));
        assert!(!manager.finish_sync(&SyncReport::default()));

        let state = manager.snapshot();
        assert!(!state.is_syncing);
        assert_eq!(state.passes_completed, 2);
    }

    #[test]
    fn test_finish_emits_report_counts() {
        let manager = SyncStateManager::new();
        manager.try_begin_sync();

        let report = SyncReport {
            registered: vec!["220".to_string()],
            uninstalled: vec!["10".to_string()],
            ..SyncReport::default()
        };
        let mut rx = manager.subscribe();
        manager.finish_sync(&report);

        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::SyncFinished {
                registered: 1,
                installed: 0,
                uninstalled: 1,
                skipped: 0,
            }
        );
    }

    #[test]
    fn test_rerun_emits_finished_then_started() {
        let manager = SyncStateManager::new();
        manager.try_begin_sync();
        manager.try_begin_sync();

        let mut rx = manager.subscribe();
        manager.finish_sync(&SyncReport::default());

        assert!(matches!(rx.try_recv().unwrap(), StateChange::SyncFinished { .. }));
        assert_eq!(rx.try_recv().unwrap(), StateChange::SyncStarted);
    }

    #[test]
    fn test_record_change() {
        let manager = SyncStateManager::new();
        let event = ChangeEvent {
            kind: ChangeKind::Deleted,
            path: Utf8PathBuf::from("/steamapps/appmanifest_1.acf"),
        };

        let changes = manager.record_change(&event);
        assert_eq!(
            changes,
            vec![StateChange::ManifestChanged {
                kind: ChangeKind::Deleted,
                path: event.path.clone(),
            }]
        );

        // Same event again is not a change
        assert!(manager.record_change(&event).is_empty());
    }

    #[test]
    fn test_watching_toggle() {
        let manager = SyncStateManager::new();
        assert_eq!(
            manager.set_watching(true),
            vec![StateChange::WatcherChanged { watching: true }]
        );
        assert!(manager.set_watching(true).is_empty());
    }

    #[test]
    fn test_clone_shares_state() {
        let manager1 = SyncStateManager::new();
        let manager2 = manager1.clone();

        manager1.set_watching(true);
        assert!(manager2.snapshot().is_watching);
    }
}
