//! Remembers which catalog entry the user picked for add-ons with more than one provider.
//!
//! A choice is only trusted while every provider currently in the catalog was already on offer when the choice was
//! made. As soon as a new provider shows up, the user has to be asked again.

use std::collections::{BTreeMap, BTreeSet};

use addman_catalog::catalog::CatalogEntry;
use addman_utils::types::CatalogId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored choice refers to an entry that is not a current candidate. Only happens if the store was corrupted (eg.
/// edited by hand), since we never use a choice that does not cover the current candidates.
#[derive(Debug, Error)]
#[error(
    "The stored provider choice for \"{name}\" selects {selected}, which is not one of the current providers \
     ({available:?}). Remove the entry from the resolutions in the config to be asked again."
)]
pub struct InvariantError {
    pub name: String,
    pub selected: CatalogId,
    pub available: Vec<CatalogId>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Resolution {
    /// The entry the user picked.
    pub selected: CatalogId,

    /// Every candidate that was offered when the choice was made.
    pub options: BTreeSet<CatalogId>,
}

impl Resolution {
    /// True iff every current candidate was already on offer when this choice was made.
    ///
    /// Note that a candidate set that has shrunk is still covered, even if the entry that was picked is the one that
    /// disappeared.
    pub fn covers(&self, candidates: &[&CatalogEntry]) -> bool {
        candidates
            .iter()
            .all(|candidate| self.options.contains(&candidate.id))
    }

    /// Find the entry this resolution picked among the current candidates.
    pub fn selected_entry<'a>(
        &self,
        name: &str,
        candidates: &[&'a CatalogEntry],
    ) -> Result<&'a CatalogEntry, InvariantError> {
        candidates
            .iter()
            .find(|candidate| candidate.id == self.selected)
            .copied()
            .ok_or_else(|| InvariantError {
                name: name.to_string(),
                selected: self.selected,
                available: candidates.iter().map(|c| c.id).collect(),
            })
    }
}

/// Keyed by add-on path. Stale entries are never purged, they just stop being used.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolutionStore {
    resolutions: BTreeMap<String, Resolution>,
}

impl ResolutionStore {
    pub fn lookup(&self, name: &str) -> Option<&Resolution> {
        self.resolutions.get(name)
    }

    /// Overwrites any existing choice for `name`.
    pub fn record<I: IntoIterator<Item = CatalogId>>(
        &mut self,
        name: &str,
        selected: CatalogId,
        options: I,
    ) {
        self.resolutions.insert(
            name.to_string(),
            Resolution {
                selected,
                options: options.into_iter().collect(),
            },
        );
    }

    /// The stored choice for `name`, but only if it still covers `candidates`.
    pub fn trusted_choice(&self, name: &str, candidates: &[&CatalogEntry]) -> Option<&Resolution> {
        self.lookup(name)
            .filter(|resolution| resolution.covers(candidates))
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use addman_catalog::catalog::CatalogEntry;

    use super::ResolutionStore;

    fn entries(ids: &[u64]) -> Vec<CatalogEntry> {
        ids.iter()
            .map(|&id| CatalogEntry {
                id,
                ..Default::default()
            })
            .collect()
    }

    fn refs(entries: &[CatalogEntry]) -> Vec<&CatalogEntry> {
        entries.iter().collect()
    }

    fn store_with_choice(selected: u64, options: &[u64]) -> ResolutionStore {
        let mut store = ResolutionStore::default();
        store.record("Foo", selected, options.iter().copied());
        store
    }

    #[test]
    fn covers_iff_candidates_are_a_subset_of_the_options() {
        let store = store_with_choice(1, &[1, 2]);
        let res = store.lookup("Foo").unwrap();

        assert!(res.covers(&refs(&entries(&[1, 2]))));
        assert!(res.covers(&refs(&entries(&[2, 1]))));
        assert!(res.covers(&refs(&entries(&[1]))));
        assert!(res.covers(&refs(&entries(&[2]))));
        assert!(res.covers(&[]));

        assert!(!res.covers(&refs(&entries(&[1, 2, 3]))));
        assert!(!res.covers(&refs(&entries(&[3]))));
    }

    #[test]
    fn trusted_choice_ignores_choices_that_no_longer_cover() {
        let store = store_with_choice(1, &[1, 2]);

        assert!(store.trusted_choice("Foo", &refs(&entries(&[1, 2]))).is_some());
        assert!(store.trusted_choice("Foo", &refs(&entries(&[1, 2, 3]))).is_none());
        assert!(store.trusted_choice("Bar", &refs(&entries(&[1, 2]))).is_none());
    }

    #[test]
    fn record_overwrites() {
        let mut store = store_with_choice(1, &[1, 2]);
        store.record("Foo", 3, [1, 2, 3]);

        let res = store.lookup("Foo").unwrap();
        assert_eq!(res.selected, 3);
        assert_eq!(res.options.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn selected_entry_is_found_among_candidates() {
        let store = store_with_choice(2, &[1, 2]);
        let candidates = entries(&[1, 2]);

        let picked = store
            .lookup("Foo")
            .unwrap()
            .selected_entry("Foo", &refs(&candidates))
            .unwrap();

        assert_eq!(picked.id, 2);
    }

    #[test]
    fn selected_entry_missing_from_candidates_is_an_invariant_error() {
        // The picked provider was removed from the catalog, which still counts as covered.
        let store = store_with_choice(2, &[1, 2]);
        let candidates = entries(&[1]);
        let res = store.lookup("Foo").unwrap();

        assert!(res.covers(&refs(&candidates)));

        let err = res.selected_entry("Foo", &refs(&candidates)).unwrap_err();
        assert_eq!(err.name, "Foo");
        assert_eq!(err.selected, 2);
        assert_eq!(err.available, vec![1]);
    }
}
