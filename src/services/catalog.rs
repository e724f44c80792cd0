//! Catalog and game-configuration seams.
//!
//! The sync engine never owns game storage. It talks to a [`Catalog`] for game
//! records and a [`ConfigStore`] for per-game runner configuration. In-memory
//! implementations are provided for the command-line tool and for tests.

use indexmap::IndexMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::models::{CatalogEntry, CatalogFilter, GameUpdate};

/// Errors reported by catalog and configuration-store implementations.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog entry {0} not found")]
    NotFound(u64),

    #[error("Cannot create catalog entry without a {0}")]
    MissingField(&'static str),

    #[error("Catalog storage error: {0}")]
    Storage(String),
}

/// The game catalog, as consumed by the sync engine.
///
/// Methods take `&self`; implementations serialize concurrent writers themselves.
#[cfg_attr(test, mockall::automock)]
pub trait Catalog: Send + Sync {
    fn find_by_steam_id(&self, steam_id: &str) -> Result<Option<CatalogEntry>, CatalogError>;

    fn find_all(&self, filter: CatalogFilter) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Update the entry selected by `update.id` (or `update.steam_id`), creating
    /// it when no entry matches. Returns the entry id.
    fn upsert(&self, update: GameUpdate) -> Result<u64, CatalogError>;
}

/// Per-game runner configuration.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore: Send + Sync {
    /// Configuration id for `slug`, reusing an existing configuration with that id.
    fn get_or_create_config_id(&self, slug: &str) -> Result<String, CatalogError>;

    /// Record the Steam app id in a game's configuration.
    fn set_app_id(&self, runner: &str, config_id: &str, app_id: &str) -> Result<(), CatalogError>;
}

#[derive(Debug, Default)]
struct CatalogInner {
    entries: IndexMap<u64, CatalogEntry>,
    next_id: u64,
    writes: usize,
}

/// Catalog kept in memory, seeded from and dumped to a snapshot.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: Mutex<CatalogInner>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let entries = entries.into_iter().map(|e| (e.id, e)).collect();
        Self {
            inner: Mutex::new(CatalogInner {
                entries,
                next_id,
                writes: 0,
            }),
        }
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.lock()?.entries.values().cloned().collect())
    }

    /// Number of upserts that changed or created an entry.
    pub fn write_count(&self) -> Result<usize, CatalogError> {
        Ok(self.lock()?.writes)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CatalogInner>, CatalogError> {
        self.inner
            .lock()
            .map_err(|_| CatalogError::Storage("catalog lock poisoned".to_string()))
    }
}

impl Catalog for MemoryCatalog {
    fn find_by_steam_id(&self, steam_id: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self
            .lock()?
            .entries
            .values()
            .find(|entry| entry.has_steam_id(steam_id))
            .cloned())
    }

    fn find_all(&self, filter: CatalogFilter) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self
            .lock()?
            .entries
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }

    fn upsert(&self, update: GameUpdate) -> Result<u64, CatalogError> {
        let mut inner = self.lock()?;

        let existing = match (update.id, update.steam_id.as_deref()) {
            (Some(id), _) => Some(id),
            (None, Some(steam_id)) => inner
                .entries
                .values()
                .find(|entry| entry.has_steam_id(steam_id))
                .map(|entry| entry.id),
            (None, None) => None,
        };

        if let Some(id) = existing {
            let entry = inner.entries.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
            if update.apply_to(entry) {
                inner.writes += 1;
                tracing::debug!("Updated catalog entry {}", id);
            }
            return Ok(id);
        }

        let name = update.name.clone().ok_or(CatalogError::MissingField("name"))?;
        let slug = update.slug.clone().ok_or(CatalogError::MissingField("slug"))?;
        let id = inner.next_id.max(1);
        inner.next_id = id + 1;

        let mut entry = CatalogEntry {
            id,
            steam_id: None,
            name,
            slug,
            runner: String::new(),
            installed: false,
            config_path: None,
        };
        update.apply_to(&mut entry);
        inner.entries.insert(id, entry);
        inner.writes += 1;

        tracing::debug!("Created catalog entry {}", id);
        Ok(id)
    }
}

/// A game's runner configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameConfig {
    pub runner: Option<String>,
    pub app_id: Option<String>,
}

/// Configuration store kept in memory, keyed by configuration id.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: Mutex<IndexMap<String, GameConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, config_id: &str) -> Option<GameConfig> {
        self.configs.lock().ok()?.get(config_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.configs.lock().map(|configs| configs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexMap<String, GameConfig>>, CatalogError> {
        self.configs
            .lock()
            .map_err(|_| CatalogError::Storage("config store lock poisoned".to_string()))
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_or_create_config_id(&self, slug: &str) -> Result<String, CatalogError> {
        if slug.is_empty() {
            return Err(CatalogError::MissingField("slug"));
        }
        let mut configs = self.lock()?;
        if !configs.contains_key(slug) {
            tracing::debug!("Creating game configuration {}", slug);
            configs.insert(slug.to_string(), GameConfig::default());
        }
        Ok(slug.to_string())
    }

    fn set_app_id(&self, runner: &str, config_id: &str, app_id: &str) -> Result<(), CatalogError> {
        let mut configs = self.lock()?;
        let config = configs.entry(config_id.to_string()).or_default();
        config.runner = Some(runner.to_string());
        config.app_id = Some(app_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(steam_id: &str, name: &str) -> GameUpdate {
        GameUpdate {
            steam_id: Some(steam_id.to_string()),
            name: Some(name.to_string()),
            slug: Some(crate::models::slugify(name)),
            runner: Some("steam".to_string()),
            installed: Some(true),
            ..GameUpdate::default()
        }
    }

    #[test]
    fn test_upsert_creates_then_updates_by_steam_id() {
        let catalog = MemoryCatalog::new();

        let first = catalog.upsert(update("220", "Half-Life 2")).unwrap();
        let second = catalog.upsert(update("220", "Half-Life 2")).unwrap();

        assert_eq!(first, second);
        assert_eq!(catalog.entries().unwrap().len(), 1);
        // The second upsert changed nothing
        assert_eq!(catalog.write_count().unwrap(), 1);
    }

    #[test]
    fn test_upsert_requires_name_and_slug_to_create() {
        let catalog = MemoryCatalog::new();
        let result = catalog.upsert(GameUpdate {
            steam_id: Some("1".to_string()),
            ..GameUpdate::default()
        });

        assert!(matches!(result, Err(CatalogError::MissingField("name"))));
        assert!(catalog.entries().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_unknown_id_fails() {
        let catalog = MemoryCatalog::new();
        let result = catalog.upsert(GameUpdate {
            id: Some(9),
            installed: Some(false),
            ..GameUpdate::default()
        });
        assert!(matches!(result, Err(CatalogError::NotFound(9))));
    }

    #[test]
    fn test_from_entries_continues_ids() {
        let catalog = MemoryCatalog::from_entries(vec![CatalogEntry {
            id: 7,
            steam_id: None,
            name: "Quake".to_string(),
            slug: "quake".to_string(),
            runner: "linux".to_string(),
            installed: true,
            config_path: None,
        }]);

        let id = catalog.upsert(update("10", "Counter-Strike")).unwrap();
        assert_eq!(id, 8);
        assert_eq!(catalog.find_all(CatalogFilter::Steam).unwrap().len(), 1);
        assert_eq!(catalog.find_all(CatalogFilter::Installed).unwrap().len(), 2);
    }

    #[test]
    fn test_config_id_is_reused() {
        let store = MemoryConfigStore::new();
        assert_eq!(store.get_or_create_config_id("portal").unwrap(), "portal");
        assert_eq!(store.get_or_create_config_id("portal").unwrap(), "portal");
        assert_eq!(store.len(), 1);

        store.set_app_id("steam", "portal", "400").unwrap();
        assert_eq!(
            store.get("portal"),
            Some(GameConfig {
                runner: Some("steam".to_string()),
                app_id: Some("400".to_string()),
            })
        );
    }
}
