use crate::models::{CatalogEntry, SyncConfig};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Prefix of environment variables overriding `steamsync.yaml`.
pub const ENV_PREFIX: &str = "STEAMSYNC";

/// Configuration manager for the settings file and the catalog snapshot.
///
/// Both live in one directory:
/// - Settings (`steamsync.yaml`): Steam directories, watch mode, logging
/// - Catalog snapshot (`catalog.yaml` by default): the games the sync engine manages
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("steamsync.yaml"),
            config_dir,
        })
    }

    /// Load the settings file, then apply `STEAMSYNC_*` environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load_sync_config(&self) -> Result<SyncConfig> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::new(self.settings_path.as_str(), ::config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let config: SyncConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(config)
    }

    pub fn save_sync_config(&self, config: &SyncConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load a catalog snapshot. `file_name` is relative to the configuration directory.
    ///
    /// A missing snapshot is an empty catalog.
    pub fn load_catalog(&self, file_name: &str) -> Result<Vec<CatalogEntry>> {
        let path = self.config_dir.join(file_name);
        if !path.exists() {
            tracing::info!("No catalog snapshot at {}, starting empty", path);
            return Ok(Vec::new());
        }

        let file_contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog: {}", path))?;

        let entries: Vec<CatalogEntry> = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse catalog: {}", path))?;

        tracing::info!("Loaded {} catalog entries from {}", entries.len(), path);
        Ok(entries)
    }

    pub fn save_catalog(&self, file_name: &str, entries: &[CatalogEntry]) -> Result<()> {
        let path = self.config_dir.join(file_name);
        let yaml_string =
            serde_yaml_ng::to_string(entries).context("Failed to serialize catalog to YAML")?;

        fs::write(&path, yaml_string)
            .with_context(|| format!("Failed to write catalog: {}", path))?;

        tracing::debug!("Saved {} catalog entries to {}", entries.len(), path);
        Ok(())
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(root.join("nested").join("config")).unwrap();
        assert!(manager.config_dir().is_dir());
    }

    #[test]
    fn test_save_and_load_sync_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let config = SyncConfig {
            winesteam_dir: "/wine/Steam".to_string(),
            event_queue_capacity: 8,
            ..SyncConfig::default()
        };
        manager.save_sync_config(&config).unwrap();

        let loaded = manager.load_sync_config().unwrap();
        assert_eq!(loaded.winesteam_dir, "/wine/Steam");
        assert_eq!(loaded.event_queue_capacity, 8);
        assert!(loaded.watch);
    }

    #[test]
    fn test_missing_catalog_is_empty() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.load_catalog("catalog.yaml").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_catalog_is_an_error() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_dir().join("catalog.yaml"), "id: [").unwrap();
        assert!(manager.load_catalog("catalog.yaml").is_err());
    }
}
