//! Error types for membership and distributed locking.

use thiserror::Error;

/// Errors that can occur in membership operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    #[error("Lock {name} is not held by {member}")]
    LockNotHeld { name: String, member: String },

    #[error("Timed out waiting for lock {name}")]
    LockTimeout { name: String },

    #[error("Unknown member: {0}")]
    UnknownMember(String),
}

pub type Result<T> = std::result::Result<T, MembershipError>;
