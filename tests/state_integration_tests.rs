//! Integration tests for SyncStateManager with state change events
//!
//! These tests verify that the SyncStateManager correctly:
//! - Emits state change events on pass start and finish
//! - Supports multiple subscribers
//! - Keeps passes single-flight under concurrent requests
//! - Tracks watcher status and manifest changes

use camino::Utf8PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use steamsync::{ChangeEvent, ChangeKind, StateChange, SyncReport, SyncStateManager};
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn test_sync_events_emitted() {
    let state = Arc::new(SyncStateManager::new());
    let mut rx = state.subscribe();

    assert!(state.try_begin_sync());

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    assert_eq!(event, StateChange::SyncStarted);

    let report = SyncReport {
        installed: vec!["500".to_string()],
        ..SyncReport::default()
    };
    assert!(!state.finish_sync(&report));

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    assert_eq!(
        event,
        StateChange::SyncFinished {
            registered: 0,
            installed: 1,
            uninstalled: 0,
            skipped: 0,
        }
    );
    assert_eq!(state.read(|s| s.last_report.clone()), Some(report));
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(SyncStateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();

    state.set_watching(true);

    for rx in [&mut rx1, &mut rx2] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert_eq!(event, StateChange::WatcherChanged { watching: true });
    }
}

#[tokio::test]
async fn test_concurrent_requests_run_one_pass_at_a_time() {
    let state = Arc::new(SyncStateManager::new());
    let passes = Arc::new(AtomicUsize::new(0));
    let running = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for _ in 0..10 {
        let state = Arc::clone(&state);
        let passes = Arc::clone(&passes);
        let running = Arc::clone(&running);
        handles.push(tokio::spawn(async move {
            if !state.try_begin_sync() {
                return;
            }
            loop {
                assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0, "overlapping passes");
                tokio::time::sleep(Duration::from_millis(5)).await;
                passes.fetch_add(1, Ordering::SeqCst);
                running.fetch_sub(1, Ordering::SeqCst);

                if !state.finish_sync(&SyncReport::default()) {
                    break;
                }
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let status = state.snapshot();
    assert!(!status.is_syncing);
    assert!(!status.sync_pending);
    let passes = passes.load(Ordering::SeqCst) as u64;
    assert!(passes >= 1);
    assert_eq!(status.passes_completed, passes);
}

#[tokio::test]
async fn test_manifest_change_event() {
    let state = SyncStateManager::new();
    let mut rx = state.subscribe();

    state.record_change(&ChangeEvent {
        kind: ChangeKind::Created,
        path: Utf8PathBuf::from("/steamapps/appmanifest_220.acf"),
    });

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    assert_eq!(
        event,
        StateChange::ManifestChanged {
            kind: ChangeKind::Created,
            path: Utf8PathBuf::from("/steamapps/appmanifest_220.acf"),
        }
    );
}
