//! Entry events.
//!
//! An [`EntryEvent`] describes one operation against one key. It carries
//! the new value, receives the old value as the map applies it, and holds
//! the version tag that orders it against concurrent operations.

use basalt_membership::MemberIdentity;
use basalt_versions::VersionTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Kind of entry operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Invalidate,
    LocalInvalidate,
    Destroy,
    Evict,
    RegionClear,
}

impl Operation {
    pub fn is_local_invalidate(self) -> bool {
        matches!(self, Operation::LocalInvalidate)
    }

    pub fn is_eviction(self) -> bool {
        matches!(self, Operation::Evict)
    }
}

/// Unique id of an event, stable across retries and members.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Ulid);

impl EventId {
    pub fn new() -> Self {
        EventId(Ulid::new())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId {
    pub member: MemberIdentity,
    pub unique_id: u64,
}

impl TxId {
    pub fn new(member: MemberIdentity, unique_id: u64) -> Self {
        TxId { member, unique_id }
    }
}

/// One operation against one key.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryEvent<K, V> {
    key: K,
    operation: Operation,
    new_value: Option<V>,
    old_value: Option<V>,
    version_tag: Option<VersionTag>,
    origin_remote: bool,
    event_id: EventId,
    tx_id: Option<TxId>,
}

impl<K, V> EntryEvent<K, V> {
    pub fn new(key: K, operation: Operation) -> Self {
        EntryEvent {
            key,
            operation,
            new_value: None,
            old_value: None,
            version_tag: None,
            origin_remote: false,
            event_id: EventId::new(),
            tx_id: None,
        }
    }

    pub fn put(key: K, value: V) -> Self {
        Self::new(key, Operation::Update).with_new_value(value)
    }

    pub fn invalidate(key: K) -> Self {
        Self::new(key, Operation::Invalidate)
    }

    pub fn destroy(key: K) -> Self {
        Self::new(key, Operation::Destroy)
    }

    pub fn evict(key: K) -> Self {
        Self::new(key, Operation::Evict)
    }

    pub fn with_new_value(mut self, value: V) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn with_version_tag(mut self, tag: VersionTag) -> Self {
        self.version_tag = Some(tag);
        self
    }

    /// Mark the event as received from another member.
    pub fn from_remote(mut self) -> Self {
        self.origin_remote = true;
        self
    }

    pub fn with_tx_id(mut self, tx_id: TxId) -> Self {
        self.tx_id = Some(tx_id);
        self
    }

    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn set_operation(&mut self, operation: Operation) {
        self.operation = operation;
    }

    pub fn new_value(&self) -> Option<&V> {
        self.new_value.as_ref()
    }

    pub fn old_value(&self) -> Option<&V> {
        self.old_value.as_ref()
    }

    pub fn set_old_value(&mut self, value: Option<V>) {
        self.old_value = value;
    }

    pub fn version_tag(&self) -> Option<&VersionTag> {
        self.version_tag.as_ref()
    }

    pub fn set_version_tag(&mut self, tag: Option<VersionTag>) {
        self.version_tag = tag;
    }

    pub fn is_origin_remote(&self) -> bool {
        self.origin_remote
    }

    pub fn set_origin_remote(&mut self, remote: bool) {
        self.origin_remote = remote;
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn tx_id(&self) -> Option<&TxId> {
        self.tx_id.as_ref()
    }

    /// True if the event carries a tag with an assigned version.
    pub fn has_valid_version(&self) -> bool {
        self.version_tag
            .as_ref()
            .map(VersionTag::has_valid_version)
            .unwrap_or(false)
    }
}
