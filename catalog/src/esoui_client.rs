use addman_utils::types::CatalogId;
use chrono::Utc;
use log::debug;
use reqwest::blocking::{Client, ClientBuilder};
use thiserror::Error;

use crate::catalog::{Catalog, FileDetails};

pub type CatalogClientResult<T> = Result<T, CatalogClientError>;

pub static ESOUI_API_ROOT: &str = "https://api.mmoui.com/v4/game/ESO";

static USER_AGENT: &str = concat!("addman/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error("Request to {0} failed with HTTP status {1}")]
    HttpStatus(String, u16),

    #[error("Esoui returned no download link for the file {0}")]
    MissingDownloadUri(CatalogId),

    #[error("Unable to parse the response from esoui: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unable to reach esoui: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// Everything the update engine needs from the remote side.
pub trait CatalogClient {
    /// Fetch the full file list. The returned catalog is stamped with the current time.
    fn fetch_catalog(&self) -> CatalogClientResult<Catalog>;

    /// Fetch details (including download links) for the given files.
    fn fetch_file_details(&self, ids: &[CatalogId]) -> CatalogClientResult<Vec<FileDetails>>;

    /// Download the archive of a file.
    fn download_archive(&self, details: &FileDetails) -> CatalogClientResult<Vec<u8>>;
}

#[derive(Debug)]
pub struct EsouiClient {
    client: Client,
    api_root: String,
}

impl EsouiClient {
    pub fn new() -> CatalogClientResult<Self> {
        Self::with_api_root(ESOUI_API_ROOT)
    }

    pub fn with_api_root(api_root: impl Into<String>) -> CatalogClientResult<Self> {
        let client = ClientBuilder::default().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            api_root: api_root.into(),
        })
    }

    fn get_bytes(&self, url: &str) -> CatalogClientResult<Vec<u8>> {
        debug!("GET {}", url);

        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogClientError::HttpStatus(
                url.to_string(),
                status.as_u16(),
            ));
        }

        Ok(resp.bytes()?.to_vec())
    }
}

impl CatalogClient for EsouiClient {
    fn fetch_catalog(&self) -> CatalogClientResult<Catalog> {
        debug!("Fetching the esoui file list...");

        let body = self.get_bytes(&file_list_url(&self.api_root))?;
        let catalog = Catalog::from_file_list_json(&body, Utc::now())?;

        debug!("Esoui file list has {} entries", catalog.entries().len());
        Ok(catalog)
    }

    fn fetch_file_details(&self, ids: &[CatalogId]) -> CatalogClientResult<Vec<FileDetails>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.get_bytes(&file_details_url(&self.api_root, ids))?;
        Ok(FileDetails::list_from_json(&body)?)
    }

    fn download_archive(&self, details: &FileDetails) -> CatalogClientResult<Vec<u8>> {
        if details.download_uri.is_empty() {
            return Err(CatalogClientError::MissingDownloadUri(details.id));
        }

        debug!("Downloading {} ({})...", details.title, details.id);
        self.get_bytes(&details.download_uri)
    }
}

fn file_list_url(api_root: &str) -> String {
    format!("{}/filelist.json", api_root)
}

fn file_details_url(api_root: &str, ids: &[CatalogId]) -> String {
    let joined_ids = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");

    format!("{}/filedetails/{}.json", api_root, joined_ids)
}
