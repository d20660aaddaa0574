//! Error types for partitioned region clear.

use basalt_buckets::BucketError;
use basalt_membership::MembershipError;
use thiserror::Error;

/// Errors that can occur while clearing a partitioned region.
#[derive(Error, Debug)]
pub enum ClearError {
    /// Not every bucket of the region could be cleared. The message names
    /// the region and why.
    #[error("{reason}")]
    PartialClear { region: String, reason: String },

    #[error("Timed out acquiring distributed lock {name}")]
    LockTimeout { name: String },

    #[error("Member {member} departed before replying to {operation}")]
    MemberDeparted { member: String, operation: String },

    #[error("Timed out waiting for {pending} replies")]
    ReplyTimeout { pending: usize },

    #[error("Clear failed on member {member}: {reason}")]
    Remote { member: String, reason: String },

    #[error("Distribution channel is shutting down")]
    Cancelled,

    #[error("Cache writer rejected clear: {0}")]
    CacheWriter(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Bucket(#[from] BucketError),
}

impl ClearError {
    /// A bucket still had no primary when the retry time ran out.
    pub fn primary_not_found(region: &str) -> Self {
        ClearError::PartialClear {
            region: region.to_string(),
            reason: format!(
                "Unable to find primary bucket region during clear operation for region: {}",
                region
            ),
        }
    }

    /// Fewer distinct buckets were cleared than the region has.
    pub fn incomplete(region: &str) -> Self {
        ClearError::PartialClear {
            region: region.to_string(),
            reason: format!(
                "Unable to clear all the buckets from the partitioned region {}, either data (buckets) moved or member departed.",
                region
            ),
        }
    }

    pub fn is_partial_clear(&self) -> bool {
        matches!(self, ClearError::PartialClear { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClearError>;
