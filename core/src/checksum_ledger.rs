use std::collections::BTreeMap;

use addman_catalog::catalog::CatalogEntry;
use serde::{Deserialize, Serialize};

/// Which catalog checksum was last installed into each add-on directory.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChecksumLedger {
    checksums: BTreeMap<String, String>,
}

impl ChecksumLedger {
    pub fn get(&self, dir_name: &str) -> Option<&str> {
        self.checksums.get(dir_name).map(String::as_str)
    }

    /// An add-on is stale if we never installed it ourselves or the catalog has a different upload than the one we
    /// installed.
    pub fn needs_update(&self, dir_name: &str, entry: &CatalogEntry) -> bool {
        self.get(dir_name) != Some(entry.checksum.as_str())
    }

    /// Only call this once an install has fully succeeded.
    pub fn record_install<I, S>(&mut self, installed_dirs: I, checksum: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dir in installed_dirs {
            self.checksums.insert(dir.into(), checksum.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.checksums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checksums.is_empty()
    }
}
