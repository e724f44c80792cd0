//! Services module - library discovery, reconciliation and change watching.
//!
//! # Components
//!
//! - [`library`]: finds the `steamapps` directories of the native and
//!   compatibility-layer clients ([`LibraryResolver`], [`SteamInstall`]) and
//!   loads single manifests ([`get_app_manifest`]), the client settings
//!   ([`read_config`]) and library listings ([`list_apps`]).
//! - [`steam_log`]: app entries of the client's download log
//!   ([`get_app_state_log`]).
//! - [`catalog`]: the [`Catalog`] and [`ConfigStore`] seams the engine writes
//!   through, with in-memory implementations.
//! - [`sync`]: the [`SyncEngine`], which registers, installs and uninstalls
//!   catalog entries to match the manifests on disk.
//! - [`watcher`]: the [`LibraryWatcher`], which reports manifest changes from a
//!   background thread.
//!
//! None of these own a runtime. The engine is synchronous and is driven from
//! `spawn_blocking` by the binary.
//!
//! # Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use steamsync::services::{LibraryResolver, MemoryCatalog, MemoryConfigStore, SteamInstall, SyncEngine};
//!
//! let resolver = LibraryResolver::new(
//!     SteamInstall::new("steam", Some("/home/user/.steam/steam".into())),
//!     SteamInstall::new("winesteam", None),
//! );
//! let engine = SyncEngine::new(resolver, Arc::new(MemoryCatalog::new()), Arc::new(MemoryConfigStore::new()));
//! let report = engine.sync_with_catalog()?;
//! println!("{}", report.summary());
//! ```

pub mod catalog;
pub mod library;
pub mod steam_log;
pub mod sync;
pub mod watcher;

pub use catalog::{Catalog, CatalogError, ConfigStore, GameConfig, MemoryCatalog, MemoryConfigStore};
pub use library::{
    AppListing, LibraryResolver, Runner, SteamInstall, format_library_folders, get_app_manifest,
    get_path_from_appmanifest, list_apps, parse_library_folders, read_config,
};
pub use steam_log::{get_app_log, get_app_state_log, last_content_log};
pub use sync::{SkippedManifest, SyncEngine, SyncError, SyncReport};
pub use watcher::{ChangeEvent, ChangeKind, LibraryWatcher, WatcherState, watch_libraries};
