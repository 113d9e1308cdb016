//! State persisted between runs.
//!
//! The state directory looks like this:
//! config.toml         (add-on directory, checksum ledger, provider choices)
//! catalog_cache.json  (last fetched file list and when it was fetched)
//! .lockfile           (only while addman is running)
//!
//! Everything is loaded once at startup and saved once before exiting. The lock file is held the whole time, so two
//! runs can't overwrite each other's state.

use std::{fs::create_dir_all, io};

use addman_catalog::catalog::Catalog;
use addman_utils::utils::{
    DeserializationError, SerializationError, deserialize_data_from_path_if_present,
    deserialize_json_from_path_if_present, serialize_data_to_path, serialize_json_to_path,
};
use camino::{Utf8Path, Utf8PathBuf};
use lockfile::Lockfile;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{checksum_ledger::ChecksumLedger, resolution_store::ResolutionStore};

pub type StateResult<T> = Result<T, StateError>;

static CONFIG_FILE_NAME: &str = "config.toml";
static CATALOG_CACHE_FILE_NAME: &str = "catalog_cache.json";
static STATE_LOCKFILE_NAME: &str = ".lockfile";

/// Bumped whenever `config.toml` changes in a way older versions can't read.
pub const CONFIG_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(
        "Unable to lock the state directory. Is addman already running? If not, delete \"{0}\" and try again. \
         ({1})"
    )]
    Locked(Utf8PathBuf, #[source] lockfile::Error),

    #[error("Unable to load \"{0}\": {1}")]
    Load(Utf8PathBuf, #[source] DeserializationError),

    #[error("Unable to save \"{0}\": {1}")]
    Save(Utf8PathBuf, #[source] SerializationError),

    #[error("\"{0}\" was written by a newer version of addman (format {1}, this version reads up to {2})")]
    UnsupportedFormatVersion(Utf8PathBuf, u32, u32),
}

// Need to ignore the unused field because we actually "use" this field when the struct gets dropped.
#[allow(dead_code)]
#[derive(Debug)]
struct StateLockFile(Lockfile);

impl StateLockFile {
    fn new(p: &Utf8Path) -> StateResult<Self> {
        let lock_path = p.join(STATE_LOCKFILE_NAME);

        Lockfile::create(&lock_path)
            .map(Self)
            .map_err(|e| StateError::Locked(lock_path, e))
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct AddmanConfig {
    pub version: u32,

    /// The game's add-on directory. Asked for on the first run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addon_dir: Option<Utf8PathBuf>,

    pub checksums: ChecksumLedger,
    pub resolutions: ResolutionStore,
}

impl Default for AddmanConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            addon_dir: None,
            checksums: ChecksumLedger::default(),
            resolutions: ResolutionStore::default(),
        }
    }
}

#[derive(Debug)]
pub struct PersistedState {
    dir_path: Utf8PathBuf,
    pub config: AddmanConfig,
    pub cached_catalog: Option<Catalog>,

    /// We hold the lock-file until the state is dropped.
    _lock_file: StateLockFile,
}

impl PersistedState {
    pub fn load_from_dir(p: &Utf8Path) -> StateResult<Self> {
        if !p.exists() {
            info!("State directory does not exist at \"{p}\". Creating...");
            create_dir_all(p)?;
        }

        let _lock_file = StateLockFile::new(p)?;

        let config_path = p.join(CONFIG_FILE_NAME);
        let config: AddmanConfig = match deserialize_data_from_path_if_present(&config_path)
            .map_err(|e| StateError::Load(config_path.clone(), e))?
        {
            Some(config) => config,
            None => {
                info!("No config found at \"{config_path}\". Will create one during this run.");
                AddmanConfig::default()
            },
        };

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(StateError::UnsupportedFormatVersion(
                config_path,
                config.version,
                CONFIG_FORMAT_VERSION,
            ));
        }

        let catalog_path = p.join(CATALOG_CACHE_FILE_NAME);
        let cached_catalog = match deserialize_json_from_path_if_present(&catalog_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                // Not worth failing over, it just gets fetched again.
                warn!("Ignoring unreadable catalog cache at \"{catalog_path}\": {e}");
                None
            },
        };

        debug!(
            "Loaded state from \"{p}\" ({} checksums, {} provider choices, cached catalog: {})",
            config.checksums.len(),
            config.resolutions.len(),
            cached_catalog.is_some()
        );

        Ok(Self {
            dir_path: p.to_owned(),
            config,
            cached_catalog,
            _lock_file,
        })
    }

    pub fn save(&self) -> StateResult<()> {
        let config_path = self.dir_path.join(CONFIG_FILE_NAME);
        serialize_data_to_path(&config_path, &self.config)
            .map_err(|e| StateError::Save(config_path, e))?;

        if let Some(catalog) = &self.cached_catalog {
            let catalog_path = self.dir_path.join(CATALOG_CACHE_FILE_NAME);
            serialize_json_to_path(&catalog_path, catalog)
                .map_err(|e| StateError::Save(catalog_path, e))?;
        }

        debug!("Saved state to \"{}\"", self.dir_path);
        Ok(())
    }
}
