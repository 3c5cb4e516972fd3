//! Error types for the core crate.

use thiserror::Error;

use crate::asset::AssetId;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Asset id was never registered with the database
    #[error("Unknown asset id: {0}")]
    UnknownAsset(AssetId),

    /// Asset path is registered but no file backs it
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Invalid data error
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Whether this error means the asset simply isn't there.
    ///
    /// Loaders treat these as soft failures and fall back to a placeholder.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::UnknownAsset(_) | Self::AssetNotFound(_) => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            Self::InvalidData(_) => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
