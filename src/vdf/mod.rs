//! Reader and writer for Valve's text key-value format (VDF).
//!
//! Steam stores app manifests (`appmanifest_<id>.acf`), `libraryfolders.vdf` and
//! most of its client configuration in this format:
//!
//! ```text
//! "AppState"
//! {
//!     "appid"         "220"
//!     "name"          "Half-Life 2"
//!     "UserConfig"
//!     {
//!         "language"      "english"
//!     }
//! }
//! ```
//!
//! The parser is line oriented and lenient: a line that is neither a nested
//! object header, a `"key" "value"` pair nor a closing brace is logged and
//! skipped. The only hard failure is an I/O error on the underlying reader.
//!
//! Escaped quotes and multi-line values are not supported.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use thiserror::Error;

/// Errors raised while reading or writing VDF data.
///
/// Malformed content is never an error; it is dropped line by line.
#[derive(Error, Debug)]
pub enum VdfError {
    #[error("Failed to read VDF data: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open VDF file {path}: {source}")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write VDF file {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A value stored under a VDF key: either a string or a nested object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfValue {
    Str(String),
    Node(VdfNode),
}

impl VdfValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::Str(value) => Some(value),
            VdfValue::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&VdfNode> {
        match self {
            VdfValue::Node(node) => Some(node),
            VdfValue::Str(_) => None,
        }
    }
}

impl From<&str> for VdfValue {
    fn from(value: &str) -> Self {
        VdfValue::Str(value.to_string())
    }
}

impl From<String> for VdfValue {
    fn from(value: String) -> Self {
        VdfValue::Str(value)
    }
}

impl From<VdfNode> for VdfValue {
    fn from(node: VdfNode) -> Self {
        VdfValue::Node(node)
    }
}

/// One level of a VDF document.
///
/// Keys keep their insertion order and are unique within a level; inserting an
/// existing key replaces its value in place. Equality is structural and does not
/// depend on key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VdfNode {
    entries: IndexMap<String, VdfValue>,
}

impl VdfNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<VdfValue>) -> Option<VdfValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(VdfValue::as_str)
    }

    pub fn get_node(&self, key: &str) -> Option<&VdfNode> {
        self.get(key).and_then(VdfValue::as_node)
    }

    /// Look a key up ignoring ASCII case, preferring an exact match.
    ///
    /// Steam is inconsistent about key casing (`installdir` vs `InstallDir`,
    /// `LibraryFolders` vs `libraryfolders`).
    pub fn get_ci(&self, key: &str) -> Option<&VdfValue> {
        self.entries.get(key).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    pub fn get_str_ci(&self, key: &str) -> Option<&str> {
        self.get_ci(key).and_then(VdfValue::as_str)
    }

    pub fn get_node_ci(&self, key: &str) -> Option<&VdfNode> {
        self.get_ci(key).and_then(VdfValue::as_node)
    }

    /// Follow a path of nested keys, e.g. `["AppState", "UserConfig", "name"]`.
    pub fn get_path(&self, path: &[&str]) -> Option<&VdfValue> {
        let (last, parents) = path.split_last()?;
        let mut node = self;
        for key in parents {
            node = node.get_node(key)?;
        }
        node.get(last)
    }

    pub fn remove(&mut self, key: &str) -> Option<VdfValue> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VdfValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

impl<K: Into<String>, V: Into<VdfValue>> FromIterator<(K, V)> for VdfNode {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut node = VdfNode::new();
        for (key, value) in iter {
            node.insert(key, value);
        }
        node
    }
}

/// Parse VDF text from a buffered reader.
///
/// # Errors
///
/// Only I/O failures of `reader` are reported; malformed lines are logged and
/// skipped.
pub fn parse<R: BufRead>(reader: R) -> Result<VdfNode, VdfError> {
    let mut lines = reader.lines();
    parse_level(&mut lines)
}

/// Parse VDF text held in memory.
pub fn parse_str(text: &str) -> VdfNode {
    let mut lines = text.lines().map(|line| Ok::<_, io::Error>(line.to_string()));
    // Iterating a &str never yields an I/O error.
    parse_level(&mut lines).unwrap_or_default()
}

/// Read and parse a VDF file.
pub fn read_file(path: &Utf8Path) -> Result<VdfNode, VdfError> {
    let file = File::open(path).map_err(|source| VdfError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse(BufReader::new(file))
}

/// Serialize `node` and write it to `path`, replacing any existing file.
pub fn write_file(path: &Utf8Path, node: &VdfNode) -> Result<(), VdfError> {
    fs::write(path, serialize(node)).map_err(|source| VdfError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_level<I>(lines: &mut I) -> Result<VdfNode, VdfError>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut node = VdfNode::new();

    while let Some(line) = lines.next() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed == "}" {
            return Ok(node);
        }
        // Blank lines and stray opening braces hold no key, so they are not
        // reported as malformed
        if trimmed.is_empty() || trimmed == "{" {
            tracing::debug!("Skipping VDF line without a key: {:?}", trimmed);
            continue;
        }

        let segments: Vec<&str> = trimmed.split('"').collect();
        match segments.len() {
            // "key" on its own opens a nested object
            3 => {
                let key = segments[1].to_string();
                // The line after the key is the opening brace; it carries no data.
                if let Some(brace) = lines.next() {
                    brace?;
                }
                let child = parse_level(lines)?;
                node.insert(key, child);
            }
            5 => {
                node.insert(segments[1], segments[3]);
            }
            _ => {
                tracing::error!("Malformed VDF line, skipping: {}", trimmed);
            }
        }
    }

    Ok(node)
}

/// Serialize a node to tab-indented VDF text.
pub fn serialize(node: &VdfNode) -> String {
    let mut out = String::new();
    write_level(node, 0, &mut out);
    out
}

fn write_level(node: &VdfNode, level: usize, out: &mut String) {
    let indent = "\t".repeat(level);

    for (key, value) in node.iter() {
        match value {
            VdfValue::Node(child) => {
                out.push_str(&format!("{indent}\"{key}\"\n"));
                out.push_str(&format!("{indent}{{\n"));
                write_level(child, level + 1, out);
                out.push_str(&format!("{indent}}}\n"));
            }
            VdfValue::Str(text) => {
                out.push_str(&format!("{indent}\"{key}\"\t\t\"{text}\"\n"));
            }
        }
    }
}
