use std::{fmt::Display, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use zarrs::array::{ArrayCreateError, ArrayError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum SampleError {
    #[error("sample asset not found at {path}")]
    AssetMissing { path: PathBuf },

    #[error("failed to read sample asset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The asset exists but does not decode into a non-empty 2-D grid
    #[error("sample asset {path} is corrupt: {msg}")]
    Corrupt { path: PathBuf, msg: String },
}

#[derive(thiserror::Error, Debug)]
pub enum MaterializationError {
    #[error("invalid dataset layout: {msg}")]
    InvalidLayout { msg: String },

    #[error("invalid codec configuration: {msg}")]
    Codec { msg: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not open store at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("could not create array: {source}")]
    Create {
        #[from]
        source: ArrayCreateError,
    },

    #[error("could not write array: {source}")]
    Write {
        #[from]
        source: ArrayError,
    },
}

impl MaterializationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MaterializationError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BackendReadError {
    #[error("no zarr metadata found at {path}")]
    MissingMetadata { path: PathBuf },

    #[error("invalid zarr metadata at {path}: {msg}")]
    InvalidMetadata { path: PathBuf, msg: String },

    /// An empty store is an error, not an empty result
    #[error("no arrays found in store at {path}")]
    NoArrays { path: PathBuf },

    #[error("unsupported data type {data_type}")]
    UnsupportedDataType { data_type: String },

    #[error("array at {path} does not use a regular chunk grid")]
    IrregularChunkGrid { path: PathBuf },

    #[error("decoded array has an unexpected shape: {msg}")]
    Shape { msg: String },

    #[error("could not open store at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("could not open array: {source}")]
    Open {
        #[from]
        source: ArrayCreateError,
    },

    #[error("could not read array: {source}")]
    Read {
        #[from]
        source: ArrayError,
    },
}

/// A suite that can't be set up as configured.
#[derive(thiserror::Error, Debug)]
pub enum SuiteError {
    #[error("unknown dataset `{name}` in the {matrix} matrix")]
    UnknownDataset { name: String, matrix: String },

    /// Two different datasets would share one store directory
    #[error("datasets `{first}` and `{second}` both resolve to {path}")]
    PathCollision {
        first: String,
        second: String,
        path: PathBuf,
    },
}

/// The user-visible classification of a failed benchmark combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AssetMissing,
    Materialization,
    BackendRead,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AssetMissing => "asset_missing",
            ErrorKind::Materialization => "materialization",
            ErrorKind::BackendRead => "backend_read",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SampleError {
    /// An unreadable or corrupt asset is reported like a missing one.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::AssetMissing
    }
}
