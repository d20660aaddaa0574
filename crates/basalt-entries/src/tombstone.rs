//! Tombstone tracking.
//!
//! Tombstones are queued in creation order with the version they were
//! stamped with. A queued record only identifies a tombstone; before one
//! is collected the map checks that the slot still holds a tombstone with
//! the same version, so a key re-created and destroyed again is not
//! collected early.

use basalt_membership::MemberIdentity;
use basalt_versions::{RegionVersionVector, VersionStamp};
use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub(crate) struct TombstoneRecord<K> {
    pub key: K,
    pub member: Option<MemberIdentity>,
    pub region_version: u64,
    pub entry_version: u64,
    pub created_at_ms: i64,
}

impl<K> TombstoneRecord<K> {
    pub fn new(key: K, stamp: &VersionStamp, created_at_ms: i64) -> Self {
        TombstoneRecord {
            key,
            member: stamp.member().cloned(),
            region_version: stamp.region_version(),
            entry_version: stamp.entry_version(),
            created_at_ms,
        }
    }

    /// True if `stamp` is the stamp this record was created from.
    pub fn matches(&self, stamp: &VersionStamp) -> bool {
        stamp.member() == self.member.as_ref()
            && stamp.region_version() == self.region_version
            && stamp.entry_version() == self.entry_version
    }

    pub fn is_expired(&self, now_ms: i64, timeout_ms: u64) -> bool {
        self.created_at_ms.saturating_add(timeout_ms as i64) <= now_ms
    }

    pub fn is_collectable(&self, gc_vector: &RegionVersionVector) -> bool {
        match &self.member {
            Some(member) => gc_vector.is_tombstone_collectable(member, self.region_version),
            None => false,
        }
    }
}

/// Tombstones awaiting collection, oldest first.
#[derive(Debug)]
pub(crate) struct TombstoneQueue<K> {
    records: VecDeque<TombstoneRecord<K>>,
}

impl<K> TombstoneQueue<K> {
    pub fn new() -> Self {
        TombstoneQueue {
            records: VecDeque::new(),
        }
    }

    pub fn push(&mut self, record: TombstoneRecord<K>) {
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Remove up to `limit` records older than `timeout_ms`.
    pub fn take_expired(&mut self, now_ms: i64, timeout_ms: u64, limit: usize) -> Vec<TombstoneRecord<K>> {
        let mut expired = Vec::new();
        while expired.len() < limit {
            match self.records.front() {
                Some(record) if record.is_expired(now_ms, timeout_ms) => {
                    if let Some(record) = self.records.pop_front() {
                        expired.push(record);
                    }
                }
                _ => break,
            }
        }
        expired
    }

    /// Remove every record the GC vector allows collecting.
    pub fn take_collectable(&mut self, gc_vector: &RegionVersionVector) -> Vec<TombstoneRecord<K>> {
        let mut collectable = Vec::new();
        let mut kept = VecDeque::with_capacity(self.records.len());
        for record in self.records.drain(..) {
            if record.is_collectable(gc_vector) {
                collectable.push(record);
            } else {
                kept.push_back(record);
            }
        }
        self.records = kept;
        collectable
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
