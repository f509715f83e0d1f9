//! Error types for fractional vegetation cover processing

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fvc operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open raster dataset {path}: {reason}")]
    DatasetOpen { path: PathBuf, reason: String },

    #[error("Cannot create raster dataset {path}: {reason}")]
    DatasetCreate { path: PathBuf, reason: String },

    #[error("Cannot open vector dataset {path}: {reason}")]
    VectorOpen { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::DatasetOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn create(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::DatasetCreate {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn vector(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::VectorOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

/// Result type alias for fvc operations
pub type Result<T> = std::result::Result<T, Error>;
