//! Works out which catalog entries need to be installed for the add-ons currently on disk.
//!
//! A pass looks at every scanned add-on and every dependency it declares. Each distinct name is checked once:
//! - No provider in the catalog: warn and move on.
//! - One provider: compare checksums.
//! - Several providers: use the stored choice if it still covers every provider, otherwise ask the user and remember
//!   the answer.
//!
//! The pass does not install anything. It returns the worklist and lets the caller install, re-scan and run another
//! pass, since freshly installed add-ons can bring new dependencies with them.

use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
    io, iter,
};

use addman_catalog::catalog::{Catalog, CatalogEntry};
use addman_utils::{types::CatalogId, user_input_delegate::UserInputDelegate};
use chrono::Local;
use log::{debug, warn};
use thiserror::Error;

use crate::{
    checksum_ledger::ChecksumLedger,
    inventory::ScannedAddon,
    resolution_store::{InvariantError, ResolutionStore},
};

pub type UpdateResolverResult<T> = Result<T, UpdateResolverError>;

#[derive(Debug, Error)]
pub enum UpdateResolverError {
    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error("Unable to ask which provider to use for \"{0}\": {1}")]
    Prompt(String, #[source] io::Error),

    #[error("Picked option {1} for \"{0}\", but there are only {2} providers")]
    InvalidSelection(String, usize, usize),
}

/// How a name was matched against the catalog, without asking the user anything.
#[derive(Debug)]
pub enum ProviderMatch<'a> {
    None,
    Single(&'a CatalogEntry),

    /// Several providers, picked by a stored choice that still covers all of them.
    Stored(&'a CatalogEntry),

    /// Several providers and no usable stored choice.
    Ambiguous(Vec<&'a CatalogEntry>),
}

/// Non fatal problems found during a pass.
#[derive(Debug)]
pub enum PassWarning {
    ScanFailed { name: String, reason: String },
    NoProvider(String),
}

impl Display for PassWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PassWarning::ScanFailed { name, reason } => {
                write!(f, "Failed to scan addon '{}': {}", name, reason)
            },
            PassWarning::NoProvider(name) => write!(
                f,
                "No downloadable addons found providing '{}' - will not be updated",
                name
            ),
        }
    }
}

/// What a pass produced.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Catalog entries to install, in the order they were found. No duplicates.
    pub worklist: Vec<CatalogId>,
    pub warnings: Vec<PassWarning>,

    /// Every name looked up in the catalog, in order.
    pub checked: Vec<String>,
}

impl PassOutcome {
    fn queue(&mut self, id: CatalogId) {
        if !self.worklist.contains(&id) {
            self.worklist.push(id);
        }
    }
}

/// Run-scoped state of a single pass.
#[derive(Debug, Default)]
struct PassState {
    seen: HashSet<String>,
    outcome: PassOutcome,
}

impl PassState {
    /// Returns `false` if the name was already checked during this pass.
    fn mark_checked(&mut self, name: &str) -> bool {
        let first_time = self.seen.insert(name.to_string());
        if first_time {
            self.outcome.checked.push(name.to_string());
        }

        first_time
    }
}

pub fn match_provider<'a>(
    name: &str,
    catalog: &'a Catalog,
    store: &ResolutionStore,
) -> Result<ProviderMatch<'a>, InvariantError> {
    let candidates = catalog.by_path(name);

    Ok(match candidates.len() {
        0 => ProviderMatch::None,
        1 => ProviderMatch::Single(candidates[0]),
        _ => match store.trusted_choice(name, &candidates) {
            Some(resolution) => ProviderMatch::Stored(resolution.selected_entry(name, &candidates)?),
            None => ProviderMatch::Ambiguous(candidates),
        },
    })
}

/// Find the catalog entry to use for `name`, asking the user if the choice is ambiguous. A new choice is recorded in
/// `store` before returning.
pub fn resolve_provider<'a, U: UserInputDelegate>(
    name: &str,
    catalog: &'a Catalog,
    store: &mut ResolutionStore,
    user_input_delegate: &mut U,
) -> UpdateResolverResult<Option<&'a CatalogEntry>> {
    Ok(match match_provider(name, catalog, store)? {
        ProviderMatch::None => None,
        ProviderMatch::Single(entry) | ProviderMatch::Stored(entry) => Some(entry),
        ProviderMatch::Ambiguous(candidates) => {
            Some(prompt_for_provider(name, &candidates, store, user_input_delegate)?)
        },
    })
}

fn prompt_for_provider<'a, U: UserInputDelegate>(
    name: &str,
    candidates: &[&'a CatalogEntry],
    store: &mut ResolutionStore,
    user_input_delegate: &mut U,
) -> UpdateResolverResult<&'a CatalogEntry> {
    let options = candidates
        .iter()
        .map(|entry| ProviderOption(*entry))
        .collect::<Vec<_>>();

    let msg = format!(
        "Addon {} has multiple providers on esoui.com, which would you like to use?",
        name
    );

    let picked_idx = user_input_delegate
        .select_item_from_list(&msg, &options)
        .map_err(|e| UpdateResolverError::Prompt(name.to_string(), e))?;

    let picked = *candidates.get(picked_idx).ok_or_else(|| {
        UpdateResolverError::InvalidSelection(name.to_string(), picked_idx, candidates.len())
    })?;

    store.record(name, picked.id, candidates.iter().map(|entry| entry.id));
    debug!("Using {} ({}) as the provider of {}", picked.title, picked.id, name);

    Ok(picked)
}

/// How a provider is shown to the user when picking between several.
#[derive(Debug)]
pub struct ProviderOption<'a>(pub &'a CatalogEntry);

impl Display for ProviderOption<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let entry = self.0;

        write!(
            f,
            "'{}' by {} ({} downloads, last updated ",
            entry.title, entry.author, entry.downloads
        )?;

        match entry.last_updated() {
            Some(t) => write!(f, "{})", t.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
            None => write!(f, "unknown)"),
        }
    }
}

/// Check every scanned add-on and its dependencies against the catalog.
///
/// Only an unusable stored choice or a failed prompt stops the pass. Everything else ends up in
/// [`PassOutcome::warnings`].
pub fn run_pass<U: UserInputDelegate>(
    addons: &[ScannedAddon],
    catalog: &Catalog,
    ledger: &ChecksumLedger,
    store: &mut ResolutionStore,
    user_input_delegate: &mut U,
) -> UpdateResolverResult<PassOutcome> {
    let mut state = PassState::default();

    for scanned in addons {
        let addon = match scanned {
            ScannedAddon::Valid(addon) => addon,
            ScannedAddon::Invalid { name, err } => {
                warn!("Failed to scan addon '{}': {}", name, err);
                state.outcome.warnings.push(PassWarning::ScanFailed {
                    name: name.clone(),
                    reason: err.to_string(),
                });
                continue;
            },
        };

        let names = iter::once(addon.name.as_str())
            .chain(addon.dependencies.iter().map(|dep| dep.name.as_str()));

        for name in names {
            if !state.mark_checked(name) {
                continue;
            }

            check_name(&mut state, name, catalog, ledger, store, user_input_delegate)?;
        }
    }

    debug!(
        "Checked {} add-ons, {} need updating or installing",
        state.outcome.checked.len(),
        state.outcome.worklist.len()
    );

    Ok(state.outcome)
}

fn check_name<U: UserInputDelegate>(
    state: &mut PassState,
    name: &str,
    catalog: &Catalog,
    ledger: &ChecksumLedger,
    store: &mut ResolutionStore,
    user_input_delegate: &mut U,
) -> UpdateResolverResult<()> {
    match resolve_provider(name, catalog, store, user_input_delegate)? {
        None => {
            let warning = PassWarning::NoProvider(name.to_string());
            warn!("{}", warning);
            state.outcome.warnings.push(warning);
        },
        Some(entry) if ledger.needs_update(name, entry) => {
            debug!("{} needs updating from {} ({})", name, entry.title, entry.id);
            state.outcome.queue(entry.id);
        },
        Some(_) => debug!("{} is up to date", name),
    }

    Ok(())
}
