//! Error types for version bookkeeping.

use thiserror::Error;

/// Errors that can occur when recording or querying versions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("No versions recorded for member {0}")]
    MissingMember(String),

    #[error("Version tag from {member} carries no valid version")]
    InvalidTag { member: String },
}

pub type Result<T> = std::result::Result<T, VersionError>;
