//! Integration tests for LibraryWatcher on a real directory
//!
//! These tests verify that the LibraryWatcher correctly:
//! - Reports manifest creation and deletion
//! - Ignores files that aren't manifests
//! - Stops delivering events once stopped, and tolerates repeated stops
//! - Queues changes made while a full pass runs, for replay after it

use camino::Utf8PathBuf;
use std::fs;
use std::sync::{Arc, mpsc};
use std::time::Duration;
use steamsync::services::WatcherState;
use steamsync::{
    ChangeEvent, ChangeKind, LibraryResolver, LibraryWatcher, MemoryCatalog, MemoryConfigStore,
    Metrics, SteamInstall, SyncEngine, watch_libraries,
};
use tempfile::TempDir;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn temp_library() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

/// Wait for the first event of `kind`, skipping any others.
fn wait_for(rx: &mpsc::Receiver<ChangeEvent>, kind: ChangeKind) -> Option<ChangeEvent> {
    let deadline = std::time::Instant::now() + EVENT_TIMEOUT;
    while let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now()) {
        match rx.recv_timeout(remaining) {
            Ok(event) if event.kind == kind => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    None
}

#[test]
fn test_manifest_create_and_delete_are_reported() {
    let (_temp_dir, root) = temp_library();
    let (tx, rx) = mpsc::channel();

    let mut watcher = watch_libraries(&[root.clone()], move |event| {
        let _ = tx.send(event);
    });
    assert!(watcher.is_watching());

    // Not a manifest: must not be reported
    fs::write(root.join("foo.txt"), "hello").unwrap();

    let manifest = root.join("appmanifest_1.acf");
    fs::write(&manifest, "\"AppState\"\n{\n}\n").unwrap();

    let created = wait_for(&rx, ChangeKind::Created).expect("no create event");
    assert_eq!(created.path.file_name(), Some("appmanifest_1.acf"));

    fs::remove_file(&manifest).unwrap();
    let deleted = wait_for(&rx, ChangeKind::Deleted).expect("no delete event");
    assert_eq!(deleted.path.file_name(), Some("appmanifest_1.acf"));

    watcher.stop();
    assert_eq!(watcher.state(), WatcherState::Stopped);

    // Every event delivered was for a manifest
    while let Ok(event) = rx.try_recv() {
        assert!(event.path.as_str().ends_with(".acf"), "unexpected event {:?}", event);
    }
}

#[test]
fn test_no_events_after_stop() {
    let (_temp_dir, root) = temp_library();
    let (tx, rx) = mpsc::channel();

    let mut watcher = watch_libraries(&[root.clone()], move |event| {
        let _ = tx.send(event);
    });
    watcher.stop();
    watcher.stop();
    assert!(!watcher.is_watching());

    fs::write(root.join("appmanifest_2.acf"), "").unwrap();
    // The callback was dropped with the watcher thread
    assert!(matches!(
        rx.recv_timeout(Duration::from_millis(500)),
        Err(mpsc::RecvTimeoutError::Disconnected) | Err(mpsc::RecvTimeoutError::Timeout)
    ));
}

#[test]
fn test_missing_root_is_skipped() {
    let (_temp_dir, root) = temp_library();
    let watcher = watch_libraries(&[root.join("does-not-exist"), root.clone()], |_| {});
    assert!(watcher.is_watching());
}

#[tokio::test]
async fn test_channel_delivers_events() {
    let (_temp_dir, root) = temp_library();
    let metrics = Arc::new(Metrics::new());
    let (mut watcher, mut events) =
        LibraryWatcher::with_channel(&[root.clone()], 16, metrics.clone());

    fs::write(root.join("appmanifest_3.acf"), "\"AppState\"\n{\n}\n").unwrap();

    let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("Timeout waiting for change event")
        .expect("Channel closed");
    assert_eq!(event.path.file_name(), Some("appmanifest_3.acf"));
    assert!(
        metrics
            .change_events
            .load(std::sync::atomic::Ordering::Relaxed)
            >= 1
    );

    watcher.stop();
}

#[tokio::test]
async fn test_changes_during_first_pass_are_replayed_after_it() {
    let (_temp_dir, root) = temp_library();
    let steam_dir = root.join("Steam");
    fs::create_dir_all(steam_dir.join("steamapps")).unwrap();

    let catalog = Arc::new(MemoryCatalog::new());
    let engine = SyncEngine::new(
        LibraryResolver::new(
            SteamInstall::new("steam", Some(steam_dir.clone())),
            SteamInstall::new("winesteam", None),
        ),
        catalog.clone(),
        Arc::new(MemoryConfigStore::new()),
    );

    let roots: Vec<Utf8PathBuf> = engine
        .resolver()
        .resolve_flat()
        .into_iter()
        .map(|root| root.path)
        .collect();
    let (mut watcher, mut events) =
        LibraryWatcher::with_channel(&roots, 16, engine.metrics().clone());

    fs::write(
        steam_dir.join("steamapps").join("appmanifest_220.acf"),
        "\"AppState\"\n{\n\t\"appid\"\t\t\"220\"\n\t\"name\"\t\t\"Half-Life 2\"\n\t\"StateFlags\"\t\t\"4\"\n}\n",
    )
    .unwrap();

    let report = engine.sync_with_catalog().unwrap();
    assert_eq!(report.registered, vec!["220".to_string()]);

    let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("Timeout waiting for change event")
        .expect("Channel closed");
    assert_eq!(event.path.file_name(), Some("appmanifest_220.acf"));

    // The pass already applied the change
    assert!(engine.handle_change(&event).unwrap().is_noop());
    assert_eq!(catalog.entries().unwrap().len(), 1);

    watcher.stop();
}
