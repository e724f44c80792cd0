use serde::{Deserialize, Serialize};

use super::library::{STEAM_RUNNER, WINESTEAM_RUNNER};

/// A game as known to the catalog.
///
/// The catalog owns these records; the sync engine only reads them and writes
/// back through [`GameUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,

    #[serde(default)]
    pub steam_id: Option<String>,

    pub name: String,

    pub slug: String,

    #[serde(default)]
    pub runner: String,

    #[serde(default)]
    pub installed: bool,

    #[serde(default)]
    pub config_path: Option<String>,
}

impl CatalogEntry {
    /// True if the entry is run by one of the Steam client variants.
    pub fn is_steam_runner(&self) -> bool {
        self.runner == STEAM_RUNNER || self.runner == WINESTEAM_RUNNER
    }

    pub fn has_steam_id(&self, steam_id: &str) -> bool {
        self.steam_id.as_deref() == Some(steam_id)
    }
}

/// Selection used by `Catalog::find_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFilter {
    All,
    /// Entries that carry a Steam app id, whatever their runner.
    Steam,
    Installed,
}

impl CatalogFilter {
    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        match self {
            CatalogFilter::All => true,
            CatalogFilter::Steam => entry.steam_id.as_deref().is_some_and(|id| !id.is_empty()),
            CatalogFilter::Installed => entry.installed,
        }
    }
}

/// Fields written by a catalog upsert. `None` leaves the stored value untouched.
///
/// With `id` set the matching entry is updated; without it the catalog looks
/// the entry up by `steam_id` and creates it when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameUpdate {
    pub id: Option<u64>,
    pub steam_id: Option<String>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub runner: Option<String>,
    pub installed: Option<bool>,
    pub config_path: Option<String>,
}

impl GameUpdate {
    /// Apply the set fields to `entry`, returning whether anything changed.
    pub fn apply_to(&self, entry: &mut CatalogEntry) -> bool {
        let before = entry.clone();

        if let Some(steam_id) = &self.steam_id {
            entry.steam_id = Some(steam_id.clone());
        }
        if let Some(name) = &self.name {
            entry.name = name.clone();
        }
        if let Some(slug) = &self.slug {
            entry.slug = slug.clone();
        }
        if let Some(runner) = &self.runner {
            entry.runner = runner.clone();
        }
        if let Some(installed) = self.installed {
            entry.installed = installed;
        }
        if let Some(config_path) = &self.config_path {
            entry.config_path = Some(config_path.clone());
        }

        *entry != before
    }
}

/// Lowercase, URL and filesystem safe form of a game name.
///
/// Runs of characters that aren't letters or digits become a single `-`;
/// leading and trailing separators are dropped. Accented Latin letters are
/// folded to ASCII, other non-ASCII letters are removed.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_separator = false;

    for ch in value.chars() {
        let folded = if ch.is_ascii_alphanumeric() {
            Some(ch.to_ascii_lowercase().to_string())
        } else {
            fold_latin(ch).map(str::to_string)
        };

        match folded {
            Some(text) => {
                if pending_separator && !slug.is_empty() {
                    slug.push('-');
                }
                pending_separator = false;
                slug.push_str(&text);
            }
            None if ch.is_alphanumeric() => {}
            None => pending_separator = true,
        }
    }

    slug
}

fn fold_latin(ch: char) -> Option<&'static str> {
    let folded = match ch.to_lowercase().next().unwrap_or(ch) {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' => "s",
        'ß' => "ss",
        'ť' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}
