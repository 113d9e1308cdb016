//! Fakes and fixtures shared by the unit tests.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    fmt::Display,
    io::{self, Cursor, Write},
};

use addman_catalog::{
    catalog::{Catalog, CatalogEntry, FileDetails, ProvidedAddon},
    esoui_client::{CatalogClient, CatalogClientError, CatalogClientResult},
};
use addman_utils::{
    types::CatalogId,
    user_input_delegate::{PathCompleter, UserInputDelegate},
};
use chrono::Utc;
use zip::{ZipWriter, write::SimpleFileOptions};

use crate::inventory::{LocalAddonBuilder, ScannedAddon};

/// Answers prompts from a script and records what it was asked.
#[derive(Debug, Default)]
pub(crate) struct ScriptedUserInputDelegate {
    answers: VecDeque<usize>,
    path_answers: VecDeque<String>,

    /// The message and rendered options of every selection prompt.
    pub(crate) prompts: Vec<(String, Vec<String>)>,

    /// The message and default of every path prompt.
    pub(crate) path_prompts: Vec<(String, Option<String>)>,
}

impl ScriptedUserInputDelegate {
    pub(crate) fn answering(answers: &[usize]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub(crate) fn answering_path(path: &str) -> Self {
        Self {
            path_answers: VecDeque::from([path.to_string()]),
            ..Default::default()
        }
    }
}

impl UserInputDelegate for ScriptedUserInputDelegate {
    fn select_item_from_list<T: Display>(
        &mut self,
        message: &str,
        items: &[T],
    ) -> io::Result<usize> {
        self.prompts.push((
            message.to_string(),
            items.iter().map(|item| item.to_string()).collect(),
        ));

        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::other("no scripted answer left"))
    }

    fn get_path_input(
        &mut self,
        message: &str,
        default: Option<&str>,
        _complete: PathCompleter<'_>,
    ) -> io::Result<String> {
        self.path_prompts
            .push((message.to_string(), default.map(str::to_string)));

        self.path_answers
            .pop_front()
            .ok_or_else(|| io::Error::other("no scripted path left"))
    }
}

pub(crate) fn entry(id: CatalogId, checksum: &str, paths: &[&str]) -> CatalogEntry {
    CatalogEntry {
        id,
        title: format!("File {id}"),
        author: "someone".to_string(),
        checksum: checksum.to_string(),
        addons: paths
            .iter()
            .map(|path| ProvidedAddon {
                path: path.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// A catalog fetched just now.
pub(crate) fn catalog(entries: Vec<CatalogEntry>) -> Catalog {
    Catalog::new(entries, Utc::now())
}

pub(crate) fn valid_addon(name: &str, deps: &[&str]) -> ScannedAddon {
    let mut builder = LocalAddonBuilder::default();
    builder.name(name).title(name);

    for dep in deps {
        builder.dependency(dep, 0);
    }

    ScannedAddon::Valid(builder.build().unwrap())
}

/// Build a zip in memory. Names ending in `/` become directory entries.
pub(crate) fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for (name, contents) in files {
        match name.ends_with('/') {
            true => zip
                .add_directory(*name, SimpleFileOptions::default())
                .unwrap(),
            false => {
                zip.start_file(*name, SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(contents.as_bytes()).unwrap();
            },
        }
    }

    zip.finish().unwrap().into_inner()
}

/// Zip containing a single add-on with the given manifest.
pub(crate) fn addon_archive(name: &str, manifest: &str) -> Vec<u8> {
    let dir = format!("{name}/");
    let manifest_path = format!("{name}/{name}.txt");
    let lua_path = format!("{name}/{name}.lua");

    zip_archive(&[
        (dir.as_str(), ""),
        (manifest_path.as_str(), manifest),
        (lua_path.as_str(), "-- lua"),
    ])
}

/// Serves a fixed catalog and in memory archives.
#[derive(Debug)]
pub(crate) struct FakeCatalogClient {
    entries: Vec<CatalogEntry>,
    archives: HashMap<CatalogId, Vec<u8>>,
    catalog_unreachable: bool,

    pub(crate) catalog_fetches: Cell<usize>,
    pub(crate) details_requests: RefCell<Vec<Vec<CatalogId>>>,
}

impl FakeCatalogClient {
    pub(crate) fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            archives: HashMap::new(),
            catalog_unreachable: false,
            catalog_fetches: Cell::new(0),
            details_requests: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            catalog_unreachable: true,
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn with_archive(mut self, id: CatalogId, archive: Vec<u8>) -> Self {
        self.archives.insert(id, archive);
        self
    }
}

impl CatalogClient for FakeCatalogClient {
    fn fetch_catalog(&self) -> CatalogClientResult<Catalog> {
        self.catalog_fetches.set(self.catalog_fetches.get() + 1);

        match self.catalog_unreachable {
            false => Ok(catalog(self.entries.clone())),
            true => Err(CatalogClientError::HttpStatus(
                "https://api.test/filelist.json".to_string(),
                503,
            )),
        }
    }

    fn fetch_file_details(&self, ids: &[CatalogId]) -> CatalogClientResult<Vec<FileDetails>> {
        self.details_requests.borrow_mut().push(ids.to_vec());

        Ok(ids
            .iter()
            .filter_map(|id| self.entries.iter().find(|entry| entry.id == *id))
            .map(|entry| FileDetails {
                download_uri: format!("https://cdn.test/{}.zip", entry.id),
                entry: entry.clone(),
            })
            .collect())
    }

    fn download_archive(&self, details: &FileDetails) -> CatalogClientResult<Vec<u8>> {
        self.archives
            .get(&details.id)
            .cloned()
            .ok_or_else(|| CatalogClientError::HttpStatus(details.download_uri.clone(), 404))
    }
}
