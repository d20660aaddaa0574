//! Messages exchanged by members taking part in a clear.
//!
//! Messages travel as JSON. [`ClearMessage::encode`] and
//! [`ClearMessage::decode`] are what a distribution channel uses to move
//! them between members.

use crate::error::Result;
use crate::event::RegionEvent;
use basalt_membership::MemberIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// What a clear message asks its recipient to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    /// Take the local clear lock on behalf of the sender.
    #[serde(rename = "OP_LOCK_FOR_PR_CLEAR")]
    LockForPrClear,
    /// Release the local clear lock.
    #[serde(rename = "OP_UNLOCK_FOR_PR_CLEAR")]
    UnlockForPrClear,
    /// Clear the locally hosted primary buckets.
    #[serde(rename = "OP_PR_CLEAR")]
    PrClear,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::LockForPrClear => "OP_LOCK_FOR_PR_CLEAR",
            OperationType::UnlockForPrClear => "OP_UNLOCK_FOR_PR_CLEAR",
            OperationType::PrClear => "OP_PR_CLEAR",
        };
        f.write_str(name)
    }
}

/// A request sent by the member coordinating a clear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClearMessage {
    pub id: Ulid,
    pub region: String,
    pub sender: MemberIdentity,
    pub operation: OperationType,
    pub event: RegionEvent,
}

impl ClearMessage {
    pub fn new(sender: MemberIdentity, operation: OperationType, event: &RegionEvent) -> Self {
        ClearMessage {
            id: Ulid::new(),
            region: event.region.clone(),
            sender,
            operation,
            event: event.to_remote(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A recipient's answer to a [`ClearMessage`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReply {
    pub message_id: Ulid,
    pub sender: MemberIdentity,
    /// Ids of the buckets the recipient cleared, with repeats when it had
    /// to clear again after a membership change.
    pub cleared_buckets: Vec<u32>,
    pub error: Option<String>,
}

impl ClearReply {
    pub fn ok(message: &ClearMessage, sender: MemberIdentity, cleared_buckets: Vec<u32>) -> Self {
        ClearReply {
            message_id: message.id,
            sender,
            cleared_buckets,
            error: None,
        }
    }

    pub fn failed(message: &ClearMessage, sender: MemberIdentity, error: impl fmt::Display) -> Self {
        ClearReply {
            message_id: message.id,
            sender,
            cleared_buckets: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
