//! Steam library discovery.
//!
//! A Steam client keeps its default library in `<steam dir>/steamapps` and lists
//! any extra libraries the user added in `steamapps/libraryfolders.vdf`. Two
//! formats of that file are found in the wild:
//!
//! ```text
//! "LibraryFolders"                      "libraryfolders"
//! {                                     {
//!     "TimeNextStatsReport" "1560000"       "0"
//!     "1"     "/mnt/games/Steam"            {
//! }                                             "path"    "/home/user/.local/share/Steam"
//!                                               "apps" { ... }
//!                                           }
//!                                       }
//! ```
//!
//! Only numerically keyed entries are libraries. Library folders are never
//! cached; every [`LibraryResolver::resolve`] call asks the runners again.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

use crate::models::manifest::{self, AppManifest, ManifestError, resolve_path_case};
use crate::models::{LibraryPaths, LibraryRoot, Platform};
use crate::vdf::{self, VdfError, VdfNode, VdfValue};

/// Client settings file, relative to the Steam data directory.
pub const STEAM_CONFIG_FILE: &str = "config/config.vdf";

/// A Steam client variant able to list its library directories.
#[cfg_attr(test, mockall::automock)]
pub trait Runner: Send + Sync {
    /// Runner name as stored in the catalog (`steam`, `winesteam`).
    fn name(&self) -> &'static str;

    /// Every `steamapps` directory managed by this runner.
    fn library_directories(&self) -> Vec<Utf8PathBuf>;
}

/// Runner backed by a Steam data directory on disk.
#[derive(Debug, Clone)]
pub struct SteamInstall {
    name: &'static str,
    steam_dir: Option<Utf8PathBuf>,
}

impl SteamInstall {
    /// `steam_dir` is the Steam data directory (the one holding `steamapps`);
    /// `None` means the client isn't installed and no libraries are reported.
    pub fn new(name: &'static str, steam_dir: Option<Utf8PathBuf>) -> Self {
        Self { name, steam_dir }
    }

    pub fn steam_dir(&self) -> Option<&Utf8Path> {
        self.steam_dir.as_deref()
    }
}

impl Runner for SteamInstall {
    fn name(&self) -> &'static str {
        self.name
    }

    fn library_directories(&self) -> Vec<Utf8PathBuf> {
        let Some(steam_dir) = &self.steam_dir else {
            return Vec::new();
        };

        let mut dirs = Vec::new();
        let Some(main) = resolve_path_case(&steam_dir.join("steamapps")) else {
            tracing::debug!("No steamapps directory in {}", steam_dir);
            return dirs;
        };
        if main.is_dir() {
            dirs.push(main.clone());
        }

        let Some(folders_file) = resolve_path_case(&main.join("libraryfolders.vdf")) else {
            return dirs;
        };
        match vdf::read_file(&folders_file) {
            Ok(root) => {
                for library in parse_library_folders(&root) {
                    let Some(steamapps) = resolve_path_case(&library.join("steamapps")) else {
                        tracing::warn!("Steam library {} has no steamapps directory", library);
                        continue;
                    };
                    if steamapps.is_dir() && !dirs.contains(&steamapps) {
                        dirs.push(steamapps);
                    }
                }
            }
            Err(e) => tracing::warn!("Could not read {}: {}", folders_file, e),
        }

        dirs
    }
}

/// Library directories listed in a parsed `libraryfolders.vdf`.
pub fn parse_library_folders(root: &VdfNode) -> Vec<Utf8PathBuf> {
    let Some(folders) = root.get_node_ci("LibraryFolders") else {
        return Vec::new();
    };

    folders
        .iter()
        .filter(|(key, _)| !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|(_, value)| match value {
            VdfValue::Str(path) => Some(path.as_str()),
            VdfValue::Node(folder) => folder.get_str_ci("path"),
        })
        .filter(|path| !path.is_empty())
        .map(Utf8PathBuf::from)
        .collect()
}

/// Resolves the library roots of the native and compatibility-layer clients.
pub struct LibraryResolver {
    native: Box<dyn Runner>,
    compat: Box<dyn Runner>,
}

impl LibraryResolver {
    pub fn new(native: impl Runner + 'static, compat: impl Runner + 'static) -> Self {
        Self {
            native: Box::new(native),
            compat: Box::new(compat),
        }
    }

    /// Library directories of both runners, kept apart by platform.
    pub fn resolve(&self) -> LibraryPaths {
        let paths = LibraryPaths {
            native: self.native.library_directories(),
            compat: self.compat.library_directories(),
        };
        tracing::debug!(
            "Resolved Steam libraries: {} native ({}), {} compat ({})",
            paths.native.len(),
            self.native.name(),
            paths.compat.len(),
            self.compat.name()
        );
        paths
    }

    /// All library roots in one list, native first.
    pub fn resolve_flat(&self) -> Vec<LibraryRoot> {
        self.resolve().roots()
    }
}

/// Load the manifest of `app_id` from a `steamapps` directory.
///
/// Returns `Ok(None)` when the library or its manifest for the app doesn't exist.
///
/// # Errors
///
/// - [`ManifestError::InvalidAppId`] if `app_id` is empty or not numeric
/// - [`ManifestError::Io`] if the manifest exists but can't be read
pub fn get_app_manifest(
    steamapps: &Utf8Path,
    app_id: &str,
) -> Result<Option<AppManifest>, ManifestError> {
    if app_id.is_empty() || !app_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ManifestError::InvalidAppId(app_id.to_string()));
    }
    if !steamapps.is_dir() {
        tracing::debug!("Steam library {} does not exist", steamapps);
        return Ok(None);
    }

    let path = steamapps.join(manifest::manifest_file_name(app_id));
    if !path.exists() {
        return Ok(None);
    }
    AppManifest::load(&path).map(Some)
}

/// Where the game `app_id` is installed in a `steamapps` directory, if anywhere.
pub fn get_path_from_appmanifest(
    steamapps: &Utf8Path,
    app_id: &str,
) -> Result<Option<Utf8PathBuf>, ManifestError> {
    Ok(get_app_manifest(steamapps, app_id)?.and_then(|manifest| manifest.install_path()))
}

/// The client settings held in `config/config.vdf` under
/// `InstallConfigStore/Software/Valve/Steam`.
///
/// Returns `Ok(None)` when the file doesn't exist or lacks that section.
pub fn read_config(steam_dir: &Utf8Path) -> Result<Option<VdfNode>, VdfError> {
    let Some(path) = resolve_path_case(&steam_dir.join(STEAM_CONFIG_FILE)) else {
        return Ok(None);
    };

    let root = vdf::read_file(&path)?;
    let section = ["InstallConfigStore", "Software", "Valve", "Steam"]
        .iter()
        .try_fold(&root, |node, key| node.get_node_ci(key));
    if section.is_none() {
        tracing::debug!("Steam config {} has no client section", path);
    }
    Ok(section.cloned())
}

/// A manifest summary, one per app and library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppListing {
    pub steam_id: String,
    pub name: Option<String>,
    pub platform: Platform,
    pub states: Vec<&'static str>,
}

impl fmt::Display for AppListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  {:8} | {:<60} | {:10} | {}",
            self.steam_id,
            self.name.as_deref().unwrap_or("-"),
            self.platform.to_string(),
            self.states.join(", ")
        )
    }
}

/// Summaries of every manifest in `libraries`, native libraries first.
///
/// Manifests that can't be read are logged and left out.
pub fn list_apps(libraries: &LibraryPaths) -> Vec<AppListing> {
    let mut listings = Vec::new();

    for root in libraries.roots() {
        let manifests = match manifest::list_manifests(&root.path) {
            Ok(manifests) => manifests,
            Err(e) => {
                tracing::warn!("Cannot list manifests in {}: {}", root.path, e);
                continue;
            }
        };

        for (steam_id, path) in manifests {
            match AppManifest::load(&path) {
                Ok(manifest) => listings.push(AppListing {
                    steam_id,
                    name: manifest.name().map(str::to_string),
                    platform: root.platform,
                    states: manifest.states(),
                }),
                Err(e) => tracing::warn!("Skipping {}: {}", path, e),
            }
        }
    }

    listings
}

/// One line per library root, tagged with its platform.
pub fn format_library_folders(libraries: &LibraryPaths) -> Vec<String> {
    libraries
        .roots()
        .iter()
        .map(|root| format!("{:10} | {}", root.platform.to_string(), root.path))
        .collect()
}
