//! Reads the add-ons installed in the game's add-on directory.
//!
//! Every immediate subdirectory of the add-on directory is an add-on, and must contain a manifest named after the
//! directory (eg. `LibAddonMenu-2.0/LibAddonMenu-2.0.txt`). Only the `## Key: Value` lines of the manifest are looked
//! at. Keys are case insensitive and anything we don't know about is ignored.

use std::{collections::HashMap, fs, io, path::is_separator};

use camino::{Utf8Path, Utf8PathBuf};
use derive_builder::Builder;
use log::{debug, warn};
use thiserror::Error;

pub type InventoryResult<T> = Result<T, InventoryError>;

const MANIFEST_LINE_PREFIX: &str = "## ";
const UTF8_BOM: char = '\u{feff}';

const TITLE_KEY: &str = "title";
const DISPLAY_VERSION_KEY: &str = "version";
const ADDON_VERSION_KEY: &str = "addonversion";
const IS_LIBRARY_KEY: &str = "islibrary";
const DEPENDS_ON_KEY: &str = "dependson";

/// Where the game keeps add-ons, relative to the home directory.
const ADDON_DIR_SUFFIX: &[&str] = &["Elder Scrolls Online", "live", "AddOns"];

/// The documents directory of the Proton prefix Steam creates for the game (app 306130).
const PROTON_DOCUMENTS: &[&str] = &[
    "steamapps",
    "compatdata",
    "306130",
    "pfx",
    "drive_c",
    "users",
    "steamuser",
    "My Documents",
];

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Unable to read the add-on directory {0}: {1}")]
    UnreadableAddonDir(Utf8PathBuf, #[source] io::Error),
}

/// Problems with a single add-on. These never stop the rest of the directory from being scanned.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unable to read metadata from {0}: {1}")]
    UnreadableMetadata(Utf8PathBuf, #[source] io::Error),

    #[error("unable to read IsLibrary field: \"{0}\" is not a boolean")]
    InvalidIsLibrary(String),

    #[error("unable to read AddOnVersion field: \"{0}\" is not an integer")]
    InvalidAddonVersion(String),

    #[error("unable to read DependsOn field: bad dependency version in \"{0}\"")]
    BadDependencyVersion(String),

    #[error("unable to read DependsOn field: invalid dependency \"{0}\"")]
    InvalidDependency(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dependency {
    /// Path (directory name) of the add-on depended on.
    pub name: String,

    /// `0` if the manifest did not specify one.
    pub minimum_version: i64,
}

#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[builder(setter(into))]
pub struct LocalAddon {
    /// The directory name. This is the key used to match against the catalog.
    pub name: String,

    #[builder(default)]
    pub title: String,

    #[builder(default)]
    pub is_library: bool,

    /// Free text `Version` field. Only for display.
    #[builder(default)]
    pub display_version: String,

    /// The `AddOnVersion` field, `0` if absent.
    #[builder(default)]
    pub declared_version: i64,

    #[builder(default, setter(custom = true))]
    pub dependencies: Vec<Dependency>,
}

impl LocalAddonBuilder {
    pub fn dependency(&mut self, name: &str, minimum_version: i64) -> &mut Self {
        self.dependencies
            .get_or_insert_with(Vec::new)
            .push(Dependency {
                name: name.to_string(),
                minimum_version,
            });
        self
    }
}

/// The result of looking at one add-on directory.
#[derive(Debug)]
pub enum ScannedAddon {
    Valid(LocalAddon),
    Invalid { name: String, err: ScanError },
}

impl ScannedAddon {
    pub fn name(&self) -> &str {
        match self {
            ScannedAddon::Valid(addon) => &addon.name,
            ScannedAddon::Invalid { name, .. } => name,
        }
    }
}

/// Scan every add-on in `addon_dir`, sorted by directory name.
///
/// Only failing to list `addon_dir` itself is an error. Add-ons that can't be read are returned as
/// [`ScannedAddon::Invalid`].
pub fn scan_installed_addons(addon_dir: &Utf8Path) -> InventoryResult<Vec<ScannedAddon>> {
    let unreadable = |e| InventoryError::UnreadableAddonDir(addon_dir.to_owned(), e);

    let mut dir_names = Vec::new();
    for entry in fs::read_dir(addon_dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;

        if !entry.file_type().map_err(unreadable)?.is_dir() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => dir_names.push(name),
            Err(name) => warn!("Skipping add-on directory with a non UTF-8 name ({name:?})"),
        }
    }

    dir_names.sort();
    debug!("Found {} add-on directories in {}", dir_names.len(), addon_dir);

    Ok(dir_names
        .into_iter()
        .map(|name| read_addon(addon_dir, name))
        .collect())
}

fn read_addon(addon_dir: &Utf8Path, name: String) -> ScannedAddon {
    let manifest_path = addon_dir.join(&name).join(format!("{name}.txt"));

    // Older manifests are often Latin-1. Only the keys need to be readable.
    let res = fs::read(&manifest_path)
        .map_err(|e| ScanError::UnreadableMetadata(manifest_path, e))
        .and_then(|contents| Manifest::parse(&String::from_utf8_lossy(&contents)).into_addon(&name));

    match res {
        Ok(addon) => ScannedAddon::Valid(addon),
        Err(err) => ScannedAddon::Invalid { name, err },
    }
}

#[derive(Debug, Default)]
struct Manifest(HashMap<String, String>);

impl Manifest {
    fn parse(contents: &str) -> Self {
        let mut fields = HashMap::new();

        for line in contents.trim_start_matches(UTF8_BOM).lines() {
            let Some(field) = line.strip_prefix(MANIFEST_LINE_PREFIX) else {
                continue;
            };

            if let Some((key, val)) = field.split_once(':') {
                fields.insert(key.trim().to_lowercase(), val.trim().to_string());
            }
        }

        Self(fields)
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn into_addon(self, name: &str) -> Result<LocalAddon, ScanError> {
        let is_library = match self.get(IS_LIBRARY_KEY) {
            Some(v) => parse_bool(v).ok_or_else(|| ScanError::InvalidIsLibrary(v.to_string()))?,
            None => false,
        };

        let declared_version = match self.get(ADDON_VERSION_KEY) {
            Some(v) => v
                .parse()
                .map_err(|_| ScanError::InvalidAddonVersion(v.to_string()))?,
            None => 0,
        };

        let dependencies = match self.get(DEPENDS_ON_KEY) {
            Some(v) => parse_dependencies(v)?,
            None => Vec::new(),
        };

        Ok(LocalAddon {
            name: name.to_string(),
            title: self.get(TITLE_KEY).unwrap_or_default().to_string(),
            is_library,
            display_version: self.get(DISPLAY_VERSION_KEY).unwrap_or_default().to_string(),
            declared_version,
            dependencies,
        })
    }
}

/// The same spellings the game's own tooling accepts.
fn parse_bool(v: &str) -> Option<bool> {
    match v {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// `LibA LibB>=12 LibC`
fn parse_dependencies(v: &str) -> Result<Vec<Dependency>, ScanError> {
    v.split_whitespace()
        .map(|dep| {
            let mut parts = dep.split(">=");

            // `split()` always yields at least one element.
            let name = parts.next().unwrap_or_default().to_string();
            let minimum_version = match (parts.next(), parts.next()) {
                (None, _) => 0,
                (Some(version), None) => version
                    .parse()
                    .map_err(|_| ScanError::BadDependencyVersion(dep.to_string()))?,
                (Some(_), Some(_)) => return Err(ScanError::InvalidDependency(dep.to_string())),
            };

            Ok(Dependency {
                name,
                minimum_version,
            })
        })
        .collect()
}

/// Look in the places the game usually keeps its add-ons.
pub fn guess_addon_directory() -> Option<Utf8PathBuf> {
    let home = Utf8PathBuf::from_path_buf(dirs::home_dir()?).ok()?;

    let candidates: [Vec<&str>; 3] = [
        [&["Documents"][..], ADDON_DIR_SUFFIX].concat(),
        [&[".local", "share", "Steam"][..], PROTON_DOCUMENTS, ADDON_DIR_SUFFIX].concat(),
        [&[".steam", "steam"][..], PROTON_DOCUMENTS, ADDON_DIR_SUFFIX].concat(),
    ];

    candidates
        .into_iter()
        .map(|parts| parts.into_iter().fold(home.clone(), |p, part| p.join(part)))
        .find(|p| p.is_dir())
}

/// Directories whose path starts with `partial`. Used to offer completions when asking for the add-on directory.
pub fn complete_path(partial: &str) -> Vec<String> {
    let (dir, prefix) = match partial.rfind(is_separator) {
        Some(idx) => partial.split_at(idx + 1),
        None => ("", partial),
    };

    let read_from = match dir.is_empty() {
        false => dir,
        true => ".",
    };

    let Ok(entries) = fs::read_dir(read_from) else {
        return Vec::new();
    };

    let mut completions = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix))
        .map(|name| format!("{dir}{name}"))
        .collect::<Vec<_>>();

    completions.sort();
    completions
}
