//! Region entries.

use crate::token::{Token, TokenKind};
use basalt_versions::{VersionStamp, VersionTag};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REGION_ID: AtomicU64 = AtomicU64::new(1);

/// Non-owning handle identifying the region an entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(u64);

impl RegionId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        RegionId(NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A single key's state inside an entry map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionEntry<K, V> {
    key: K,
    value: Token<V>,
    stamp: VersionStamp,
    region: RegionId,
    last_modified: u64,
}

impl<K, V> RegionEntry<K, V> {
    pub(crate) fn new(key: K, value: Token<V>, region: RegionId, last_modified: u64) -> Self {
        RegionEntry {
            key,
            value,
            stamp: VersionStamp::new(),
            region,
            last_modified,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn token(&self) -> &Token<V> {
        &self.value
    }

    pub fn token_kind(&self) -> TokenKind {
        self.value.kind()
    }

    pub fn value(&self) -> Option<&V> {
        self.value.value()
    }

    pub fn stamp(&self) -> &VersionStamp {
        &self.stamp
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Logical time of the last modification, used for LRU ordering.
    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    pub fn is_removed(&self) -> bool {
        self.value.is_removed()
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_tombstone()
    }

    pub fn is_invalid(&self) -> bool {
        self.value.is_invalid()
    }

    pub(crate) fn set_token(&mut self, value: Token<V>, tick: u64) -> Token<V> {
        self.last_modified = tick;
        std::mem::replace(&mut self.value, value)
    }

    pub(crate) fn apply_tag(&mut self, tag: Option<&VersionTag>) {
        if let Some(tag) = tag.filter(|t| t.has_valid_version()) {
            self.stamp.apply_tag(tag);
        }
    }
}
