//! Slot table error types.

use thiserror::Error;
use worlds_jobs::JobError;

/// Fatal slot table errors.
///
/// These are capacity or configuration bugs. Missing assets are not errors;
/// they resolve to the table's placeholder.
#[derive(Error, Debug)]
pub enum SlotError {
    /// Every slot in the table is occupied.
    #[error("out of {table} slots ({capacity} in use)")]
    OutOfSlots {
        /// Table name, e.g. "texture".
        table: &'static str,
        /// Table capacity.
        capacity: usize,
    },

    /// The placeholder that stands in for missing assets is itself missing.
    #[error("missing {table} placeholder {key}: {reason}")]
    MissingPlaceholder {
        /// Table name.
        table: &'static str,
        /// Placeholder key.
        key: String,
        /// Why it could not be loaded.
        reason: String,
    },

    /// GPU upload failed.
    #[error("{table} upload failed: {reason}")]
    Upload {
        /// Table name.
        table: &'static str,
        /// Uploader message.
        reason: String,
    },

    /// Job system failure while loading.
    #[error("job system error: {0}")]
    Jobs(#[from] JobError),

    /// Asset database failure other than a missing file.
    #[error("asset error: {0}")]
    Asset(#[from] worlds_core::Error),
}

/// Outcome of a failed [`SlotLoader::load`](crate::SlotLoader::load).
#[derive(Error, Debug)]
pub enum LoadError {
    /// The asset is missing or malformed. The table falls back to its placeholder.
    #[error("{0}")]
    Unavailable(String),

    /// Abort the load and surface the error to the caller.
    #[error(transparent)]
    Fatal(#[from] SlotError),
}

impl From<JobError> for LoadError {
    fn from(err: JobError) -> Self {
        Self::Fatal(SlotError::Jobs(err))
    }
}

impl From<worlds_core::Error> for LoadError {
    fn from(err: worlds_core::Error) -> Self {
        if err.is_not_found() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Fatal(SlotError::Asset(err))
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, SlotError>;
