use std::{
    collections::{BTreeSet, HashSet},
    io,
};

use addman_catalog::{
    catalog::{Catalog, CatalogEntry, FileDetails},
    esoui_client::{CatalogClient, CatalogClientError},
};
use addman_utils::{
    types::{AddonIdentifier, CatalogId},
    user_input_delegate::UserInputDelegate,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use log::{error, info, warn};
use thiserror::Error;

use crate::{
    checksum_ledger::ChecksumLedger,
    installer::{InstallerError, install_zipped_addon},
    inventory::{
        InventoryError, ScannedAddon, complete_path, guess_addon_directory, scan_installed_addons,
    },
    resolution_store::{InvariantError, ResolutionStore},
    state::{PersistedState, StateError},
    update_resolver::{
        ProviderMatch, UpdateResolverError, match_provider, resolve_provider, run_pass,
    },
};

pub type AddonManagerResult<T> = Result<T, AddonManagerError>;

#[derive(Debug, Error)]
pub enum AddonManagerError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    UpdateResolver(#[from] UpdateResolverError),

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error("Unable to fetch the add-on catalog: {0}")]
    CatalogFetch(#[source] CatalogClientError),

    #[error("Unable to fetch file details: {0}")]
    FileDetails(#[source] CatalogClientError),

    #[error("Unable to ask for the add-on directory: {0}")]
    Prompt(#[source] io::Error),

    #[error("The add-on directory \"{0}\" does not exist or is not a directory")]
    NotADirectory(Utf8PathBuf),

    #[error("No catalog entry has the id {0}")]
    UnknownCatalogId(CatalogId),

    #[error("No catalog entry provides an add-on named \"{0}\"")]
    UnknownAddonName(String),
}

#[derive(Debug, Error)]
enum InstallUpdateError {
    #[error(transparent)]
    Download(#[from] CatalogClientError),

    #[error(transparent)]
    Install(#[from] InstallerError),
}

#[derive(Debug)]
pub struct FailedInstall {
    pub title: String,
    pub reason: String,
}

/// What an update run did.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    /// Titles of the catalog entries installed, in install order.
    pub installed: Vec<String>,
    pub failed: Vec<FailedInstall>,

    /// Non fatal problems found while checking add-ons. Each is only reported once even if it shows up in several
    /// passes.
    pub warnings: Vec<String>,
    pub passes: usize,
}

impl UpdateSummary {
    fn warn_once(&mut self, warning: String) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

/// A catalog entry matched to an installed add-on.
#[derive(Debug)]
pub struct ProviderStatus {
    pub id: CatalogId,
    pub title: String,
    pub up_to_date: bool,
}

#[derive(Debug)]
pub enum ProviderState {
    /// The add-on could not be scanned, so it was never looked up.
    Unchecked,
    NoProvider,
    Single(ProviderStatus),
    Stored(ProviderStatus),

    /// The next update will ask which of these to use.
    Ambiguous(Vec<(CatalogId, String)>),
}

#[derive(Debug)]
pub struct AddonStatus {
    pub addon: ScannedAddon,
    pub provider: ProviderState,
}

#[derive(Debug)]
pub struct AddonManager<C: CatalogClient, U: UserInputDelegate> {
    state: PersistedState,
    client: C,
    user_input_delegate: U,
}

impl<C: CatalogClient, U: UserInputDelegate> AddonManager<C, U> {
    pub fn new(state_dir_path: &Utf8Path, client: C, user_input_delegate: U) -> AddonManagerResult<Self> {
        Ok(Self {
            state: PersistedState::load_from_dir(state_dir_path)?,
            client,
            user_input_delegate,
        })
    }

    pub fn addon_dir(&self) -> Option<&Utf8Path> {
        self.state.config.addon_dir.as_deref()
    }

    /// Work out which add-on directory to use, asking the user if we don't know it yet. The result is remembered.
    pub fn ensure_addon_dir(&mut self, override_dir: Option<&Utf8Path>) -> AddonManagerResult<Utf8PathBuf> {
        let dir = match (override_dir, &self.state.config.addon_dir) {
            (Some(dir), _) => dir.to_owned(),
            (None, Some(dir)) => dir.clone(),
            (None, None) => self.prompt_for_addon_dir()?,
        };

        if !dir.is_dir() {
            return Err(AddonManagerError::NotADirectory(dir));
        }

        self.state.config.addon_dir = Some(dir.clone());
        Ok(dir)
    }

    fn prompt_for_addon_dir(&mut self) -> AddonManagerResult<Utf8PathBuf> {
        let guess = guess_addon_directory();

        let answer = self
            .user_input_delegate
            .get_path_input(
                "Path to ESO AddOns folder:",
                guess.as_ref().map(|p| p.as_str()),
                &complete_path,
            )
            .map_err(AddonManagerError::Prompt)?;

        Ok(Utf8PathBuf::from(answer.trim()))
    }

    pub fn ensure_catalog(&mut self, force_refresh: bool) -> AddonManagerResult<&Catalog> {
        ensure_fresh_catalog(&mut self.state.cached_catalog, &self.client, force_refresh)
    }

    /// Install every stale or missing add-on, re-scanning after each round of installs until nothing is left to do.
    ///
    /// `forced` entries are installed on the first round whether they are stale or not. Each catalog entry is
    /// attempted at most once per run.
    pub fn update(
        &mut self,
        force_refresh: bool,
        forced: &[AddonIdentifier],
    ) -> AddonManagerResult<UpdateSummary> {
        let addon_dir = self.ensure_addon_dir(None)?;
        let catalog = ensure_fresh_catalog(&mut self.state.cached_catalog, &self.client, force_refresh)?;
        let config = &mut self.state.config;

        let mut worklist = resolve_forced(
            forced,
            catalog,
            &mut config.resolutions,
            &mut self.user_input_delegate,
        )?;

        let mut summary = UpdateSummary::default();
        let mut attempted: HashSet<CatalogId> = HashSet::new();

        loop {
            let addons = scan_installed_addons(&addon_dir)?;
            let outcome = run_pass(
                &addons,
                catalog,
                &config.checksums,
                &mut config.resolutions,
                &mut self.user_input_delegate,
            )?;
            summary.passes += 1;

            for warning in outcome.warnings {
                summary.warn_once(warning.to_string());
            }

            for id in outcome.worklist {
                if !worklist.contains(&id) {
                    worklist.push(id);
                }
            }

            worklist.retain(|id| match attempted.contains(id) {
                false => true,
                true => {
                    warn!(
                        "Catalog entry {} was already installed or failed during this run, not trying it again",
                        id
                    );
                    false
                },
            });

            info!("{} addons require updating or installing", worklist.len());
            if worklist.is_empty() {
                break;
            }

            let details = self
                .client
                .fetch_file_details(&worklist)
                .map_err(AddonManagerError::FileDetails)?;

            for id in worklist.iter().filter(|id| !details.iter().any(|d| d.id == **id)) {
                let warning = format!("No file details returned for catalog entry {}", id);
                warn!("{}", warning);
                summary.warn_once(warning);
            }

            attempted.extend(worklist.drain(..));
            install_updates(&self.client, &addon_dir, &details, &mut config.checksums, &mut summary);
        }

        Ok(summary)
    }

    /// Match every installed add-on against the catalog without asking anything or installing anything.
    pub fn status(&mut self, force_refresh: bool) -> AddonManagerResult<Vec<AddonStatus>> {
        let addon_dir = self.ensure_addon_dir(None)?;
        let catalog = ensure_fresh_catalog(&mut self.state.cached_catalog, &self.client, force_refresh)?;
        let config = &self.state.config;

        scan_installed_addons(&addon_dir)?
            .into_iter()
            .map(|addon| -> AddonManagerResult<AddonStatus> {
                let provider = match &addon {
                    ScannedAddon::Invalid { .. } => ProviderState::Unchecked,
                    ScannedAddon::Valid(local) => {
                        provider_state(&local.name, catalog, &config.checksums, &config.resolutions)?
                    },
                };

                Ok(AddonStatus { addon, provider })
            })
            .collect()
    }

    pub fn save(&self) -> AddonManagerResult<()> {
        Ok(self.state.save()?)
    }
}

/// Use the cached catalog unless it's missing, too old or a refresh was asked for. A stale catalog beats no catalog,
/// so a failed refresh only matters if there is nothing cached.
fn ensure_fresh_catalog<'a, C: CatalogClient>(
    cached: &'a mut Option<Catalog>,
    client: &C,
    force_refresh: bool,
) -> AddonManagerResult<&'a Catalog> {
    let catalog = match cached.take() {
        Some(catalog) if !force_refresh && catalog.is_fresh(Utc::now()) => catalog,
        stale => {
            info!("Fetching the add-on catalog...");

            match client.fetch_catalog() {
                Ok(fresh) => {
                    info!("Fetched {} catalog entries", fresh.entries().len());
                    fresh
                },
                Err(e) => match stale {
                    Some(stale) => {
                        warn!(
                            "Unable to refresh the add-on catalog ({}), using the copy from {}",
                            e,
                            stale.fetched_at()
                        );
                        stale
                    },
                    None => return Err(AddonManagerError::CatalogFetch(e)),
                },
            }
        },
    };

    Ok(&*cached.insert(catalog))
}

fn resolve_forced<U: UserInputDelegate>(
    forced: &[AddonIdentifier],
    catalog: &Catalog,
    store: &mut ResolutionStore,
    user_input_delegate: &mut U,
) -> AddonManagerResult<Vec<CatalogId>> {
    let mut ids = Vec::new();

    for ident in forced {
        let id = match ident {
            AddonIdentifier::Id(id) => catalog
                .get(*id)
                .map(|entry| entry.id)
                .ok_or(AddonManagerError::UnknownCatalogId(*id))?,
            AddonIdentifier::Path(name) => resolve_provider(name, catalog, store, user_input_delegate)?
                .map(|entry| entry.id)
                .ok_or_else(|| AddonManagerError::UnknownAddonName(name.clone()))?,
        };

        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    Ok(ids)
}

fn install_updates<C: CatalogClient>(
    client: &C,
    addon_dir: &Utf8Path,
    details: &[FileDetails],
    ledger: &mut ChecksumLedger,
    summary: &mut UpdateSummary,
) {
    for update in details {
        match install_from_details(client, addon_dir, update) {
            Ok(dirs) => {
                info!("Installed '{}' version {}", update.title, update.version);
                ledger.record_install(dirs, &update.checksum);
                summary.installed.push(update.title.clone());
            },
            Err(e) => {
                error!("Failed to install '{}': {}", update.title, e);
                summary.failed.push(FailedInstall {
                    title: update.title.clone(),
                    reason: e.to_string(),
                });
            },
        }
    }
}

fn install_from_details<C: CatalogClient>(
    client: &C,
    addon_dir: &Utf8Path,
    update: &FileDetails,
) -> Result<BTreeSet<String>, InstallUpdateError> {
    info!("Downloading {} from {}", update.title, update.download_uri);
    let archive = client.download_archive(update)?;

    Ok(install_zipped_addon(addon_dir, &archive)?)
}

fn provider_state(
    name: &str,
    catalog: &Catalog,
    ledger: &ChecksumLedger,
    store: &ResolutionStore,
) -> Result<ProviderState, InvariantError> {
    let status = |entry: &CatalogEntry| ProviderStatus {
        id: entry.id,
        title: entry.title.clone(),
        up_to_date: !ledger.needs_update(name, entry),
    };

    Ok(match match_provider(name, catalog, store)? {
        ProviderMatch::None => ProviderState::NoProvider,
        ProviderMatch::Single(entry) => ProviderState::Single(status(entry)),
        ProviderMatch::Stored(entry) => ProviderState::Stored(status(entry)),
        ProviderMatch::Ambiguous(candidates) => ProviderState::Ambiguous(
            candidates
                .into_iter()
                .map(|entry| (entry.id, entry.title.clone()))
                .collect(),
        ),
    })
}
