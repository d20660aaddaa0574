//! Error types for bucket operations.

use basalt_entries::EntryError;
use thiserror::Error;

/// Errors raised by a cache server when asked for its address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// The server's bind address cannot be resolved right now, usually
    /// because it stopped after it was listed as running.
    #[error("Bind address not available for cache server {0}")]
    BindAddressNotAvailable(String),

    #[error("Illegal server state: {0}")]
    IllegalState(String),
}

/// Errors that can occur in bucket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    #[error("Member is not primary for bucket {bucket_id} (primary: {primary:?})")]
    NotPrimary {
        bucket_id: u32,
        primary: Option<String>,
    },

    #[error("Server location error: {0}")]
    ServerLocation(#[from] ServerError),

    #[error("Bucket {0} is closed")]
    Closed(u32),

    #[error("Bucket {0} is not hosted by this member")]
    NotHosted(u32),

    #[error("Timed out waiting for a clear of bucket {0} to finish")]
    ClearInProgress(u32),

    #[error(transparent)]
    Entry(#[from] EntryError),
}

pub type Result<T> = std::result::Result<T, BucketError>;
