//! App manifest model.
//!
//! Each installed (or installing) Steam app has an `appmanifest_<appid>.acf`
//! file in the `steamapps` directory of its library. The interesting part is
//! the `AppState` object:
//!
//! ```text
//! "AppState"
//! {
//!     "appid"         "220"
//!     "name"          "Half-Life 2"
//!     "StateFlags"    "4"
//!     "installdir"    "Half-Life 2"
//! }
//! ```

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;
use thiserror::Error;

use super::app_state::StateFlags;
use super::catalog::slugify;
use super::library::{LibraryPaths, Platform};
use crate::vdf::{self, VdfError, VdfNode};

/// Matches manifest file names and captures the app id.
static MANIFEST_FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^appmanifest_(\d+)\.acf$").expect("valid manifest pattern"));

/// First run of digits in a file name.
static APP_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid app id pattern"));

/// `StateFlags` written into freshly generated manifests.
///
/// Decodes to "Update Required" + "Update Started", which makes the Steam
/// client pick the app up and finish installing it.
pub const DEFAULT_STATE_FLAGS: &str = "1026";

/// Errors raised by manifest loading and library attribution.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: VdfError,
    },

    #[error("Manifest file name carries no app id: {0}")]
    InvalidFileName(Utf8PathBuf),

    #[error("Invalid Steam app id: {0:?}")]
    InvalidAppId(String),

    #[error("Steam library directory not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("{0} is not a known native or compatibility-layer Steam library")]
    Configuration(Utf8PathBuf),
}

/// One parsed app manifest.
///
/// Loading a path that doesn't exist yields an empty manifest whose derived
/// accessors all return `None`.
#[derive(Debug, Clone)]
pub struct AppManifest {
    steam_id: String,
    manifest_path: Utf8PathBuf,
    source_path: Utf8PathBuf,
    raw_data: VdfNode,
}

impl AppManifest {
    /// Load the manifest at `manifest_path`.
    ///
    /// # Errors
    ///
    /// - [`ManifestError::InvalidFileName`] if the file name has no digits
    /// - [`ManifestError::Io`] if the file exists but can't be read
    pub fn load(manifest_path: impl AsRef<Utf8Path>) -> Result<Self, ManifestError> {
        let manifest_path = manifest_path.as_ref();
        let steam_id = manifest_path
            .file_name()
            .and_then(|name| APP_ID_PATTERN.find(name))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ManifestError::InvalidFileName(manifest_path.to_path_buf()))?;

        let mut manifest = Self {
            steam_id,
            manifest_path: manifest_path.to_path_buf(),
            source_path: manifest_path
                .parent()
                .map(Utf8Path::to_path_buf)
                .unwrap_or_default(),
            raw_data: VdfNode::new(),
        };
        manifest.reload()?;
        Ok(manifest)
    }

    /// Re-read the backing file.
    pub fn reload(&mut self) -> Result<(), ManifestError> {
        self.raw_data = if self.manifest_path.exists() {
            let root = vdf::read_file(&self.manifest_path).map_err(|source| ManifestError::Io {
                path: self.manifest_path.clone(),
                source,
            })?;
            root.get_node_ci("AppState").cloned().unwrap_or_default()
        } else {
            tracing::debug!("Manifest {} does not exist", self.manifest_path);
            VdfNode::new()
        };
        Ok(())
    }

    pub fn steam_id(&self) -> &str {
        &self.steam_id
    }

    pub fn manifest_path(&self) -> &Utf8Path {
        &self.manifest_path
    }

    /// The library (`steamapps` directory) this manifest lives in.
    pub fn source_path(&self) -> &Utf8Path {
        &self.source_path
    }

    /// The `AppState` object of the manifest.
    pub fn raw_data(&self) -> &VdfNode {
        &self.raw_data
    }

    pub fn user_config(&self) -> Option<&VdfNode> {
        self.raw_data.get_node_ci("UserConfig")
    }

    /// App name, falling back to the one stored in `UserConfig`.
    pub fn name(&self) -> Option<&str> {
        non_empty(self.raw_data.get_str_ci("name"))
            .or_else(|| non_empty(self.user_config().and_then(|config| config.get_str_ci("name"))))
    }

    pub fn slug(&self) -> Option<String> {
        self.name().map(slugify).filter(|slug| !slug.is_empty())
    }

    pub fn install_dir(&self) -> Option<&str> {
        non_empty(self.raw_data.get_str_ci("installdir"))
    }

    pub fn state_flags(&self) -> StateFlags {
        self.raw_data
            .get_str_ci("StateFlags")
            .map(StateFlags::parse)
            .unwrap_or_default()
    }

    /// Names of the active state flags.
    pub fn states(&self) -> Vec<&'static str> {
        self.state_flags().names()
    }

    pub fn is_installed(&self) -> bool {
        self.state_flags().is_fully_installed()
    }

    /// Directory holding the game files, with the casing found on disk.
    ///
    /// `None` if the manifest has no `installdir` or the directory doesn't
    /// exist under any casing.
    pub fn install_path(&self) -> Option<Utf8PathBuf> {
        let install_dir = self.install_dir()?;
        resolve_path_case(&self.source_path.join("common").join(install_dir))
    }

    /// Platform of the library this manifest was read from.
    ///
    /// # Errors
    ///
    /// [`ManifestError::Configuration`] if the manifest's library is in neither
    /// set of `libraries`.
    pub fn platform(&self, libraries: &LibraryPaths) -> Result<Platform, ManifestError> {
        libraries
            .platform_of(&self.source_path)
            .ok_or_else(|| ManifestError::Configuration(self.source_path.clone()))
    }

    /// Catalog runner name matching [`platform`](Self::platform).
    pub fn runner_name(&self, libraries: &LibraryPaths) -> Result<&'static str, ManifestError> {
        self.platform(libraries).map(Platform::runner_name)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// File name of the manifest for `app_id`.
pub fn manifest_file_name(app_id: &str) -> String {
    format!("appmanifest_{app_id}.acf")
}

/// App id of a manifest file name, or `None` if `file_name` isn't one.
pub fn parse_manifest_file_name(file_name: &str) -> Option<String> {
    MANIFEST_FILE_PATTERN
        .captures(file_name)
        .map(|caps| caps[1].to_string())
}

/// All manifests in a `steamapps` directory as `(app_id, path)`, sorted by file name.
pub fn list_manifests(steamapps: &Utf8Path) -> std::io::Result<Vec<(String, Utf8PathBuf)>> {
    let mut manifests = Vec::new();

    for entry in fs::read_dir(steamapps)? {
        let Ok(file_name) = entry?.file_name().into_string() else {
            continue;
        };
        if let Some(app_id) = parse_manifest_file_name(&file_name) {
            manifests.push((app_id, steamapps.join(file_name)));
        }
    }

    manifests.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(manifests)
}

/// Manifest tree for an app that Steam should install on its next start.
pub fn default_manifest(app_id: &str, name: &str) -> VdfNode {
    let mut user_config = VdfNode::new();
    user_config.insert("name", name);
    user_config.insert("gameid", app_id);

    let mut app_state = VdfNode::new();
    app_state.insert("appID", app_id);
    app_state.insert("Universe", "1");
    app_state.insert("StateFlags", DEFAULT_STATE_FLAGS);
    app_state.insert("installdir", name);
    app_state.insert("UserConfig", user_config);

    let mut root = VdfNode::new();
    root.insert("AppState", app_state);
    root
}

/// Write [`default_manifest`] into `steamapps`, returning the file path.
pub fn write_default_manifest(
    steamapps: &Utf8Path,
    app_id: &str,
    name: &str,
) -> Result<Utf8PathBuf, ManifestError> {
    if app_id.is_empty() || !app_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ManifestError::InvalidAppId(app_id.to_string()));
    }
    if !steamapps.is_dir() {
        return Err(ManifestError::NotFound(steamapps.to_path_buf()));
    }

    let path = steamapps.join(manifest_file_name(app_id));
    vdf::write_file(&path, &default_manifest(app_id, name)).map_err(|source| {
        ManifestError::Io {
            path: path.clone(),
            source,
        }
    })?;

    tracing::info!("Wrote default manifest for app {} to {}", app_id, path);
    Ok(path)
}

/// Find `path` on disk, matching each component case-insensitively.
///
/// Returns the path with the casing actually used on disk, or `None` if some
/// component has no match.
pub fn resolve_path_case(path: &Utf8Path) -> Option<Utf8PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }

    let mut resolved = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Normal(name) => {
                let exact = resolved.join(name);
                if exact.exists() {
                    resolved = exact;
                    continue;
                }

                let dir = if resolved.as_str().is_empty() {
                    Utf8Path::new(".")
                } else {
                    resolved.as_path()
                };
                let wanted = name.to_lowercase();
                let on_disk = fs::read_dir(dir)
                    .ok()?
                    .filter_map(Result::ok)
                    .filter_map(|entry| entry.file_name().into_string().ok())
                    .find(|candidate| candidate.to_lowercase() == wanted)?;
                resolved.push(on_disk);
            }
            other => resolved.push(other.as_str()),
        }
    }

    Some(resolved)
}
