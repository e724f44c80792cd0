// steamsync - keep a game catalog in sync with installed Steam libraries
//
// This is the library crate containing the VDF codec, the manifest model and
// the reconciliation services. The binary crate (main.rs) runs them as a
// command-line daemon.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod vdf;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{AppManifest, CatalogEntry, LibraryPaths, Platform, StateFlags, SyncConfig};
pub use services::{
    AppListing, Catalog, ChangeEvent, ChangeKind, ConfigStore, LibraryResolver, LibraryWatcher,
    MemoryCatalog, MemoryConfigStore, Runner, SteamInstall, SyncEngine, SyncReport,
    get_app_manifest, get_app_state_log, list_apps, read_config, watch_libraries,
};
pub use state::{StateChange, SyncStateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
