use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Settings from `steamsync.yaml`, overridable with `STEAMSYNC_*` environment variables.
///
/// Paths are stored as strings; an empty string means "not configured".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Native Steam data directory. Empty = auto-detect under `$HOME`.
    pub steam_dir: String,

    /// Steam data directory inside a Wine prefix. Empty = no compatibility-layer client.
    pub winesteam_dir: String,

    /// Keep running and follow library changes after the first pass.
    pub watch: bool,

    pub debug_mode: bool,

    pub log_dir: String,

    /// Catalog snapshot, relative to the configuration directory.
    pub catalog_file: String,

    /// Capacity of the queue between the library watcher and the sync loop.
    pub event_queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            steam_dir: String::new(),
            winesteam_dir: String::new(),
            watch: true,
            debug_mode: false,
            log_dir: "logs".to_string(),
            catalog_file: "catalog.yaml".to_string(),
            event_queue_capacity: 64,
        }
    }
}

impl SyncConfig {
    /// The native Steam directory, falling back to the usual locations under `$HOME`.
    pub fn native_steam_dir(&self) -> Option<Utf8PathBuf> {
        if !self.steam_dir.is_empty() {
            return Some(Utf8PathBuf::from(&self.steam_dir));
        }

        let home = Utf8PathBuf::from(std::env::var("HOME").ok()?);
        [".steam/steam", ".local/share/Steam", ".steam"]
            .iter()
            .map(|candidate| home.join(candidate))
            .find(|candidate| candidate.join("steamapps").is_dir())
    }

    pub fn compat_steam_dir(&self) -> Option<Utf8PathBuf> {
        if self.winesteam_dir.is_empty() {
            None
        } else {
            Some(Utf8PathBuf::from(&self.winesteam_dir))
        }
    }
}
