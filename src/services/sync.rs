//! Reconciliation of the catalog against on-disk Steam libraries.
//!
//! A full pass ([`SyncEngine::sync_with_catalog`]):
//!
//! 1. Resolve the native and compatibility-layer libraries.
//! 2. Load every catalog entry that carries a Steam app id.
//! 3. Walk the `appmanifest_<id>.acf` files of each library:
//!    - an app unknown to the catalog in a native library is registered when
//!      its manifest says it is fully installed;
//!    - a known app currently marked not installed is marked installed once its
//!      manifest says so, with the runner of the library it was found in.
//! 4. Known apps whose manifest was found in no library, still marked
//!    installed and run by a Steam runner, are marked uninstalled.
//!
//! A second pass with no change on disk writes nothing. An app present in
//! several libraries is handled once per library, in library order; the last
//! write wins. An app registered by the pass is not registered again from a
//! later library.
//!
//! Manifests that fail to load are logged and reported in
//! [`SyncReport::skipped`]; their id still counts as seen so the game isn't
//! marked uninstalled because of a read error.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use camino::Utf8Path;
use thiserror::Error;

use super::catalog::{Catalog, CatalogError, ConfigStore};
use super::library::LibraryResolver;
use super::watcher::{ChangeEvent, ChangeKind};
use crate::metrics::Metrics;
use crate::models::manifest::{self, AppManifest, ManifestError};
use crate::models::{
    CatalogEntry, CatalogFilter, GameUpdate, LibraryPaths, Platform, STEAM_RUNNER,
};

/// Errors raised while reconciling a single app or starting a pass.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cannot register app {steam_id}: missing {field}")]
    MissingField {
        steam_id: String,
        field: &'static str,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// An app that could not be reconciled during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedManifest {
    pub steam_id: String,
    pub reason: String,
}

/// What a pass changed, by Steam app id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// New catalog entries
    pub registered: Vec<String>,
    /// Existing entries marked installed
    pub installed: Vec<String>,
    /// Entries marked uninstalled
    pub uninstalled: Vec<String>,
    pub skipped: Vec<SkippedManifest>,
    pub manifests_seen: usize,
}

impl SyncReport {
    /// Number of catalog writes performed.
    pub fn mutations(&self) -> usize {
        self.registered.len() + self.installed.len() + self.uninstalled.len()
    }

    pub fn is_noop(&self) -> bool {
        self.mutations() == 0
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.registered.is_empty() {
            parts.push(format!("{} registered", self.registered.len()));
        }
        if !self.installed.is_empty() {
            parts.push(format!("{} installed", self.installed.len()));
        }
        if !self.uninstalled.is_empty() {
            parts.push(format!("{} uninstalled", self.uninstalled.len()));
        }
        if !self.skipped.is_empty() {
            parts.push(format!("{} skipped", self.skipped.len()));
        }

        if parts.is_empty() {
            "Nothing to sync".to_string()
        } else {
            parts.join(", ")
        }
    }

    fn skip(&mut self, steam_id: &str, error: &SyncError) {
        self.skipped.push(SkippedManifest {
            steam_id: steam_id.to_string(),
            reason: error.to_string(),
        });
    }
}

/// Outcome of reconciling one manifest.
enum Applied {
    Registered,
    Installed,
    Unchanged,
}

/// Keeps the catalog's install state in line with the Steam libraries on disk.
///
/// Passes are serialized: concurrent calls wait for the running pass to finish.
pub struct SyncEngine {
    resolver: LibraryResolver,
    catalog: Arc<dyn Catalog>,
    config_store: Arc<dyn ConfigStore>,
    metrics: Arc<Metrics>,
    pass_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        resolver: LibraryResolver,
        catalog: Arc<dyn Catalog>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self::with_metrics(resolver, catalog, config_store, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(
        resolver: LibraryResolver,
        catalog: Arc<dyn Catalog>,
        config_store: Arc<dyn ConfigStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            resolver,
            catalog,
            config_store,
            metrics,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn resolver(&self) -> &LibraryResolver {
        &self.resolver
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run one full reconciliation pass.
    ///
    /// # Errors
    ///
    /// Only a failure to list the catalog's Steam games aborts the pass.
    /// Per-app failures are reported in [`SyncReport::skipped`].
    pub fn sync_with_catalog(&self) -> Result<SyncReport, SyncError> {
        let _pass = self.pass_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let libraries = self.resolver.resolve();
        let steam_games = self.catalog.find_all(CatalogFilter::Steam)?;
        let known_ids: HashSet<&str> = steam_games
            .iter()
            .filter_map(|game| game.steam_id.as_deref())
            .collect();

        let mut report = SyncReport::default();
        let mut seen_ids: HashSet<String> = HashSet::new();
        // Apps created by this pass; `known_ids` predates them
        let mut registered_ids: HashSet<String> = HashSet::new();

        for root in libraries.roots() {
            let manifests = match manifest::list_manifests(&root.path) {
                Ok(manifests) => manifests,
                Err(e) => {
                    tracing::warn!("Cannot list manifests in {}: {}", root.path, e);
                    continue;
                }
            };

            for (steam_id, manifest_path) in manifests {
                report.manifests_seen += 1;
                seen_ids.insert(steam_id.clone());

                let result = if registered_ids.contains(&steam_id) {
                    Ok(Applied::Unchanged)
                } else if !known_ids.contains(steam_id.as_str())
                    && root.platform == Platform::Native
                {
                    self.register_if_installed(&steam_id, &manifest_path)
                } else if let Some(game) = steam_games
                    .iter()
                    .find(|game| game.has_steam_id(&steam_id) && !game.installed)
                {
                    self.install_if_ready(game, &steam_id, &manifest_path, &libraries)
                } else {
                    Ok(Applied::Unchanged)
                };

                if matches!(result, Ok(Applied::Registered)) {
                    registered_ids.insert(steam_id.clone());
                }
                record(&mut report, &steam_id, result);
            }
        }

        for game in &steam_games {
            let Some(steam_id) = game.steam_id.as_deref() else {
                continue;
            };
            if seen_ids.contains(steam_id) || !game.installed || !game.is_steam_runner() {
                continue;
            }
            match self.mark_as_uninstalled(game) {
                Ok(()) => report.uninstalled.push(steam_id.to_string()),
                Err(e) => {
                    tracing::error!("Failed to mark {} as uninstalled: {}", game.name, e);
                    report.skip(steam_id, &e);
                }
            }
        }

        self.finish(&report, started);
        Ok(report)
    }

    /// Reconcile the single manifest named by a watcher event.
    ///
    /// Created and modified manifests go through the same rules as a full
    /// pass. A deleted manifest marks its game uninstalled unless another
    /// library still holds a manifest for the same app.
    pub fn handle_change(&self, event: &ChangeEvent) -> Result<SyncReport, SyncError> {
        let _pass = self.pass_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();
        let mut report = SyncReport::default();

        let Some(steam_id) = event
            .path
            .file_name()
            .and_then(manifest::parse_manifest_file_name)
        else {
            return Ok(report);
        };

        let libraries = self.resolver.resolve();
        let Some(platform) = event.path.parent().and_then(|dir| libraries.platform_of(dir)) else {
            tracing::debug!("Ignoring change outside known libraries: {}", event.path);
            return Ok(report);
        };

        let game = self.catalog.find_by_steam_id(&steam_id)?;

        match event.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                report.manifests_seen = 1;
                let result = match &game {
                    None if platform == Platform::Native => {
                        self.register_if_installed(&steam_id, &event.path)
                    }
                    Some(game) if !game.installed => {
                        self.install_if_ready(game, &steam_id, &event.path, &libraries)
                    }
                    _ => Ok(Applied::Unchanged),
                };
                record(&mut report, &steam_id, result);
            }
            ChangeKind::Deleted => {
                let file_name = manifest::manifest_file_name(&steam_id);
                let still_present = libraries
                    .roots()
                    .iter()
                    .any(|root| root.path.join(&file_name).exists());

                if let Some(game) = game.filter(|g| g.installed && g.is_steam_runner()) {
                    if still_present {
                        tracing::debug!("{} still has a manifest in another library", game.name);
                    } else {
                        match self.mark_as_uninstalled(&game) {
                            Ok(()) => report.uninstalled.push(steam_id.clone()),
                            Err(e) => report.skip(&steam_id, &e),
                        }
                    }
                }
            }
        }

        self.finish(&report, started);
        Ok(report)
    }

    fn register_if_installed(
        &self,
        steam_id: &str,
        manifest_path: &Utf8Path,
    ) -> Result<Applied, SyncError> {
        let manifest = AppManifest::load(manifest_path)?;
        if !manifest.is_installed() {
            return Ok(Applied::Unchanged);
        }

        let name = manifest.name().map(str::to_string);
        let slug = manifest.slug();
        self.mark_as_installed(steam_id, STEAM_RUNNER, name, slug, None, None)?;
        Ok(Applied::Registered)
    }

    fn install_if_ready(
        &self,
        game: &CatalogEntry,
        steam_id: &str,
        manifest_path: &Utf8Path,
        libraries: &LibraryPaths,
    ) -> Result<Applied, SyncError> {
        let manifest = AppManifest::load(manifest_path)?;
        if !manifest.is_installed() {
            return Ok(Applied::Unchanged);
        }

        let runner = manifest.runner_name(libraries)?;
        self.mark_as_installed(
            steam_id,
            runner,
            Some(game.name.clone()),
            Some(game.slug.clone()),
            game.config_path.clone(),
            Some(game.id),
        )?;
        Ok(Applied::Installed)
    }

    fn mark_as_installed(
        &self,
        steam_id: &str,
        runner: &str,
        name: Option<String>,
        slug: Option<String>,
        config_path: Option<String>,
        id: Option<u64>,
    ) -> Result<u64, SyncError> {
        let missing = |field| SyncError::MissingField {
            steam_id: steam_id.to_string(),
            field,
        };
        let name = name.filter(|n| !n.is_empty()).ok_or_else(|| missing("name"))?;
        let slug = slug.filter(|s| !s.is_empty()).ok_or_else(|| missing("slug"))?;

        tracing::info!("Setting {} as installed", name);

        let config_id = match config_path.filter(|c| !c.is_empty()) {
            Some(config_id) => config_id,
            None => self.config_store.get_or_create_config_id(&slug)?,
        };
        let id = match id {
            Some(id) => Some(id),
            None => self.catalog.find_by_steam_id(steam_id)?.map(|game| game.id),
        };

        let game_id = self.catalog.upsert(GameUpdate {
            id,
            steam_id: Some(steam_id.to_string()),
            name: Some(name),
            slug: Some(slug),
            runner: Some(runner.to_string()),
            installed: Some(true),
            config_path: Some(config_id.clone()),
        })?;
        self.config_store.set_app_id(runner, &config_id, steam_id)?;

        Ok(game_id)
    }

    fn mark_as_uninstalled(&self, game: &CatalogEntry) -> Result<(), SyncError> {
        tracing::info!("Setting {} as uninstalled", game.name);
        self.catalog.upsert(GameUpdate {
            id: Some(game.id),
            runner: Some(String::new()),
            installed: Some(false),
            ..GameUpdate::default()
        })?;
        Ok(())
    }

    fn finish(&self, report: &SyncReport, started: Instant) {
        let elapsed = started.elapsed();
        self.metrics.record_pass(report, elapsed);

        if report.skipped.is_empty() {
            tracing::info!("Steam sync finished in {:?}: {}", elapsed, report.summary());
        } else {
            let ids: Vec<&str> = report.skipped.iter().map(|s| s.steam_id.as_str()).collect();
            tracing::warn!(
                "Steam sync finished in {:?}: {} (skipped apps: {})",
                elapsed,
                report.summary(),
                ids.join(", ")
            );
        }
    }
}

fn record(report: &mut SyncReport, steam_id: &str, result: Result<Applied, SyncError>) {
    match result {
        Ok(Applied::Registered) => report.registered.push(steam_id.to_string()),
        Ok(Applied::Installed) => report.installed.push(steam_id.to_string()),
        Ok(Applied::Unchanged) => {}
        Err(e) => {
            tracing::error!("Unable to sync Steam app {}: {}", steam_id, e);
            report.skip(steam_id, &e);
        }
    }
}
