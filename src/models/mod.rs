//! Data models for Steam library reconciliation.
//!
//! - [`StateFlags`]: decoded `StateFlags` bitmask of a manifest
//! - [`AppManifest`]: one parsed `appmanifest_<id>.acf` file
//! - [`LibraryPaths`] / [`LibraryRoot`]: resolved Steam libraries, partitioned by [`Platform`]
//! - [`CatalogEntry`] / [`GameUpdate`]: the catalog records the sync engine reads and writes
//! - [`SyncConfig`]: settings loaded from `steamsync.yaml`

pub mod app_state;
pub mod catalog;
pub mod config;
pub mod library;
pub mod manifest;

pub use app_state::{APP_STATE_FLAGS, FULLY_INSTALLED, StateFlags};
pub use catalog::{CatalogEntry, CatalogFilter, GameUpdate, slugify};
pub use config::SyncConfig;
pub use library::{LibraryPaths, LibraryRoot, Platform, STEAM_RUNNER, WINESTEAM_RUNNER};
pub use manifest::{AppManifest, ManifestError};
