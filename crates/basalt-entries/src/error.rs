//! Error types for entry map operations.

use crate::token::TokenKind;
use thiserror::Error;

/// Errors that can occur when operating on entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// The key has no live entry.
    #[error("Entry not found for key {key}")]
    EntryNotFound { key: String },

    /// The operation would leave a marker where a value is required.
    #[error("Invalid token {token:?} for key {key}")]
    InvalidToken { key: String, token: TokenKind },

    /// A concurrent operation with a newer version already won.
    #[error("Concurrent cache modification: {0}")]
    ConcurrentCacheModification(String),
}

impl EntryError {
    pub fn entry_not_found(key: &impl std::fmt::Debug) -> Self {
        EntryError::EntryNotFound {
            key: format!("{:?}", key),
        }
    }
}

pub type Result<T> = std::result::Result<T, EntryError>;
