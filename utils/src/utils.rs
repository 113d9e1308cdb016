use std::{fs, io};

use camino::Utf8Path;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub type DeserializationResult<T> = Result<T, DeserializationError>;
pub type SerializationResult<T> = Result<T, SerializationError>;

#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Toml(#[from] toml::ser::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub fn deserialize_data_from_path<T: DeserializeOwned>(p: &Utf8Path) -> DeserializationResult<T> {
    toml::from_str(&fs::read_to_string(p)?).map_err(|e| e.into())
}

pub fn serialize_data_to_path<T: Serialize>(p: &Utf8Path, v: &T) -> SerializationResult<()> {
    fs::write(p, toml::to_string(v)?)?;
    Ok(())
}

pub fn deserialize_json_from_path<T: DeserializeOwned>(p: &Utf8Path) -> DeserializationResult<T> {
    serde_json::from_slice(&fs::read(p)?).map_err(|e| e.into())
}

pub fn serialize_json_to_path<T: Serialize>(p: &Utf8Path, v: &T) -> SerializationResult<()> {
    fs::write(p, serde_json::to_vec(v)?)?;
    Ok(())
}

/// Like [`deserialize_data_from_path`], but a missing file is not an error.
pub fn deserialize_data_from_path_if_present<T: DeserializeOwned>(
    p: &Utf8Path,
) -> DeserializationResult<Option<T>> {
    Ok(match fs::exists(p)? {
        false => None,
        true => Some(deserialize_data_from_path(p)?),
    })
}

/// Like [`deserialize_json_from_path`], but a missing file is not an error.
pub fn deserialize_json_from_path_if_present<T: DeserializeOwned>(
    p: &Utf8Path,
) -> DeserializationResult<Option<T>> {
    Ok(match fs::exists(p)? {
        false => None,
        true => Some(deserialize_json_from_path(p)?),
    })
}
