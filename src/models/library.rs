use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Runner name of the native Steam client.
pub const STEAM_RUNNER: &str = "steam";

/// Runner name of the Steam client running under the Windows compatibility layer.
pub const WINESTEAM_RUNNER: &str = "winesteam";

/// Which Steam client variant manages a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Native,
    Compat,
}

impl Platform {
    /// Catalog runner name for games installed through this platform.
    pub fn runner_name(self) -> &'static str {
        match self {
            Platform::Native => STEAM_RUNNER,
            Platform::Compat => WINESTEAM_RUNNER,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Native => write!(f, "native"),
            Platform::Compat => write!(f, "compat"),
        }
    }
}

/// A `steamapps` directory holding `appmanifest_<id>.acf` files and a `common/` folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRoot {
    pub platform: Platform,
    pub path: Utf8PathBuf,
}

/// Library directories of both runner variants, kept apart by platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryPaths {
    pub native: Vec<Utf8PathBuf>,
    pub compat: Vec<Utf8PathBuf>,
}

impl LibraryPaths {
    /// Platform of the library at `path`, if it is one of the resolved roots.
    ///
    /// Native roots win when a directory is listed by both runners.
    pub fn platform_of(&self, path: &Utf8Path) -> Option<Platform> {
        if self.native.iter().any(|root| root == path) {
            Some(Platform::Native)
        } else if self.compat.iter().any(|root| root == path) {
            Some(Platform::Compat)
        } else {
            None
        }
    }

    /// All roots, native first, each tagged with its platform.
    pub fn roots(&self) -> Vec<LibraryRoot> {
        let native = self.native.iter().map(|path| LibraryRoot {
            platform: Platform::Native,
            path: path.clone(),
        });
        let compat = self.compat.iter().map(|path| LibraryRoot {
            platform: Platform::Compat,
            path: path.clone(),
        });
        native.chain(compat).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.native.is_empty() && self.compat.is_empty()
    }
}
