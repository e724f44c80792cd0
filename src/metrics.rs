// Sync metrics module
//
// Lightweight counters for monitoring library reconciliation

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::services::sync::SyncReport;

/// Sync metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// The engine records every pass here; the watcher loop records change events.
#[derive(Debug)]
pub struct Metrics {
    /// Number of completed sync passes (full or incremental)
    pub sync_passes: AtomicU64,

    /// Total manifests enumerated across all passes
    pub manifests_scanned: AtomicUsize,

    /// New catalog entries created from native libraries
    pub games_registered: AtomicUsize,

    /// Existing entries marked installed
    pub games_installed: AtomicUsize,

    /// Entries marked uninstalled after their manifest disappeared
    pub games_uninstalled: AtomicUsize,

    /// Manifests skipped because of an error
    pub manifests_skipped: AtomicUsize,

    /// Total time spent in sync passes in milliseconds
    pub total_sync_time_ms: AtomicU64,

    /// Manifest change events received from the watcher
    pub change_events: AtomicU64,

    /// Change events dropped because the queue was full
    pub change_events_dropped: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sync_passes: AtomicU64::new(0),
            manifests_scanned: AtomicUsize::new(0),
            games_registered: AtomicUsize::new(0),
            games_installed: AtomicUsize::new(0),
            games_uninstalled: AtomicUsize::new(0),
            manifests_skipped: AtomicUsize::new(0),
            total_sync_time_ms: AtomicU64::new(0),
            change_events: AtomicU64::new(0),
            change_events_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record the outcome of one pass
    pub fn record_pass(&self, report: &SyncReport, duration: Duration) {
        self.sync_passes.fetch_add(1, Ordering::Relaxed);
        self.manifests_scanned
            .fetch_add(report.manifests_seen, Ordering::Relaxed);
        self.games_registered
            .fetch_add(report.registered.len(), Ordering::Relaxed);
        self.games_installed
            .fetch_add(report.installed.len(), Ordering::Relaxed);
        self.games_uninstalled
            .fetch_add(report.uninstalled.len(), Ordering::Relaxed);
        self.manifests_skipped
            .fetch_add(report.skipped.len(), Ordering::Relaxed);
        self.total_sync_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_change_event(&self) {
        self.change_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_change_event_dropped(&self) {
        self.change_events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average pass duration in milliseconds
    pub fn avg_sync_time_ms(&self) -> f64 {
        let total = self.total_sync_time_ms.load(Ordering::Relaxed);
        let count = self.sync_passes.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Sync Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Passes: {} (avg: {:.2}ms), manifests scanned: {}",
            self.sync_passes.load(Ordering::Relaxed),
            self.avg_sync_time_ms(),
            self.manifests_scanned.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Games: {} registered, {} installed, {} uninstalled, {} skipped manifests",
            self.games_registered.load(Ordering::Relaxed),
            self.games_installed.load(Ordering::Relaxed),
            self.games_uninstalled.load(Ordering::Relaxed),
            self.manifests_skipped.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Change events: {}, dropped: {}",
            self.change_events.load(Ordering::Relaxed),
            self.change_events_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
