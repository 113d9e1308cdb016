//! In memory snapshot of the esoui.com file list.
//!
//! Every entry in the file list is one downloadable file. A file can provide several add-ons (bundles), and several
//! files can claim to provide the same add-on (forks, re-uploads). Matching between the local add-on directory and the
//! catalog is always done on the add-on path, never on titles.

use std::ops::Deref;

use addman_utils::types::CatalogId;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// How long (in hours) a fetched file list is trusted before it has to be refreshed.
pub const CATALOG_MAX_AGE_HOURS: i64 = 24;

/// The API is not consistent about leaving out fields versus sending `null`, so treat both as the zero value.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: CatalogId,

    #[serde(deserialize_with = "null_as_default")]
    pub category_id: u64,

    /// Free text version chosen by the author. Only used for display.
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,

    /// Milliseconds since the unix epoch.
    #[serde(deserialize_with = "null_as_default")]
    pub last_update: i64,

    #[serde(deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(deserialize_with = "null_as_default")]
    pub author: String,

    #[serde(rename = "fileInfoUri", deserialize_with = "null_as_default")]
    pub file_info_uri: String,

    #[serde(deserialize_with = "null_as_default")]
    pub donation_link: String,

    #[serde(deserialize_with = "null_as_default")]
    pub downloads: u64,

    #[serde(deserialize_with = "null_as_default")]
    pub downloads_monthly: u64,

    #[serde(deserialize_with = "null_as_default")]
    pub favorites: u64,

    #[serde(deserialize_with = "null_as_default")]
    pub game_versions: Vec<String>,

    /// Opaque fingerprint of the current upload. Changes whenever the file is updated.
    #[serde(deserialize_with = "null_as_default")]
    pub checksum: String,

    /// The add-ons (top level directories) this file installs.
    #[serde(deserialize_with = "null_as_default")]
    pub addons: Vec<ProvidedAddon>,

    #[serde(deserialize_with = "null_as_default")]
    pub library: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvidedAddon {
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,

    #[serde(rename = "addOnVersion", deserialize_with = "null_as_default")]
    pub addon_version: String,

    #[serde(deserialize_with = "null_as_default")]
    pub api_version: String,

    #[serde(deserialize_with = "null_as_default")]
    pub library: bool,

    #[serde(deserialize_with = "null_as_default")]
    pub required_dependencies: Vec<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub optional_dependencies: Vec<String>,
}

impl CatalogEntry {
    pub fn provided_paths(&self) -> impl Iterator<Item = &str> {
        self.addons.iter().map(|addon| addon.path.as_str())
    }

    /// Case insensitive, since the add-on directory names on disk don't always match the casing on the site.
    pub fn provides(&self, path: &str) -> bool {
        self.provided_paths()
            .any(|provided| eq_ignore_case(provided, path))
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_update)
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// A full file list along with when it was fetched.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Catalog {
    fetched_at: DateTime<Utc>,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            fetched_at,
            entries,
        }
    }

    /// Parse the body of the file list endpoint.
    pub fn from_file_list_json(body: &[u8], fetched_at: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_slice(body)?, fetched_at))
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, id: CatalogId) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Whether the snapshot can still be used at `now` without refreshing.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.fetched_at >= now - TimeDelta::hours(CATALOG_MAX_AGE_HOURS)
    }

    /// Every entry providing the given add-on path, in catalog order. Each entry appears at most once, even if it
    /// lists the same path more than once.
    pub fn by_path(&self, path: &str) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.provides(path))
            .collect()
    }
}

/// An entry from the file details endpoint. This is the only place we get download links from.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FileDetails {
    #[serde(rename = "downloadUri", default, deserialize_with = "null_as_default")]
    pub download_uri: String,

    #[serde(flatten)]
    pub entry: CatalogEntry,
}

impl Deref for FileDetails {
    type Target = CatalogEntry;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

impl FileDetails {
    pub fn list_from_json(body: &[u8]) -> serde_json::Result<Vec<Self>> {
        serde_json::from_slice(body)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};

    use super::{Catalog, CatalogEntry, FileDetails, ProvidedAddon};

    fn entry(id: u64, paths: &[&str]) -> CatalogEntry {
        CatalogEntry {
            id,
            title: format!("File {id}"),
            addons: paths
                .iter()
                .map(|p| ProvidedAddon {
                    path: p.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn catalog(entries: Vec<CatalogEntry>) -> Catalog {
        Catalog::new(entries, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    fn ids(entries: &[&CatalogEntry]) -> Vec<u64> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn by_path_is_case_insensitive_and_keeps_catalog_order() {
        let cat = catalog(vec![
            entry(5, &["LibStub"]),
            entry(2, &["Other"]),
            entry(9, &["libstub", "LibStub2"]),
        ]);

        assert_eq!(ids(&cat.by_path("LIBSTUB")), vec![5, 9]);
        assert_eq!(ids(&cat.by_path("LibStub2")), vec![9]);
    }

    #[test]
    fn by_path_returns_nothing_for_unknown_paths() {
        let cat = catalog(vec![entry(1, &["Foo"])]);
        assert!(cat.by_path("Bar").is_empty());
        assert!(cat.by_path("Fo").is_empty());
    }

    #[test]
    fn bundle_listing_a_path_twice_is_only_returned_once() {
        let cat = catalog(vec![entry(1, &["Foo", "Foo"])]);
        assert_eq!(ids(&cat.by_path("Foo")), vec![1]);
    }

    #[test]
    fn catalog_is_fresh_for_a_day() {
        let cat = catalog(Vec::new());
        let fetched = cat.fetched_at();

        assert!(cat.is_fresh(fetched));
        assert!(cat.is_fresh(fetched + TimeDelta::hours(23)));
        assert!(cat.is_fresh(fetched + TimeDelta::hours(24)));
        assert!(!cat.is_fresh(fetched + TimeDelta::hours(24) + TimeDelta::seconds(1)));
    }

    #[test]
    fn file_list_parsing_tolerates_missing_and_null_fields() {
        let body = br#"[
            {"id": 7, "title": "Lib", "checksum": "abc", "addons": [{"path": "LibFoo"}]},
            {"id": 8, "author": null, "addons": null, "downloads": 12}
        ]"#;

        let cat = Catalog::from_file_list_json(body, Utc::now()).unwrap();

        assert_eq!(cat.entries().len(), 2);
        assert_eq!(cat.get(7).unwrap().checksum, "abc");
        assert!(cat.get(7).unwrap().provides("libfoo"));

        let second = cat.get(8).unwrap();
        assert_eq!(second.author, "");
        assert!(second.addons.is_empty());
        assert_eq!(second.downloads, 12);
        assert_eq!(second.last_update, 0);
    }

    #[test]
    fn malformed_file_list_is_an_error() {
        assert!(Catalog::from_file_list_json(b"[{\"id\": ", Utc::now()).is_err());
        assert!(Catalog::from_file_list_json(b"{\"id\": 1}", Utc::now()).is_err());
    }

    #[test]
    fn file_details_include_the_entry_fields() {
        let body = br#"[{
            "id": 3,
            "title": "Foo",
            "version": "1.2",
            "checksum": "fff",
            "lastUpdate": 1700000000000,
            "downloadUri": "https://cdn.example/foo.zip",
            "addons": [{"path": "Foo", "addOnVersion": "12", "requiredDependencies": ["LibBar"]}]
        }]"#;

        let details = FileDetails::list_from_json(body).unwrap();

        assert_eq!(details.len(), 1);
        assert_eq!(details[0].download_uri, "https://cdn.example/foo.zip");
        assert_eq!(details[0].id, 3);
        assert_eq!(details[0].checksum, "fff");
        assert_eq!(details[0].addons[0].addon_version, "12");
        assert_eq!(details[0].addons[0].required_dependencies, vec!["LibBar"]);
        assert_eq!(
            details[0].last_updated().unwrap(),
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
        );
    }
}
