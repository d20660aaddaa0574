//! The capability an entry map needs from the region that owns it.
//!
//! The map decides what happens to an entry; the owner is told about it
//! through the `*_part2`/`*_part3` hooks and supplies region-wide facts
//! (initialization, concurrency checks, the version vector). The owner is
//! passed into every map call, so entries never hold a reference back to
//! their region.

use crate::config::DataPolicy;
use crate::entry::RegionEntry;
use crate::error::{EntryError, Result};
use crate::event::EntryEvent;
use basalt_versions::{SharedVersionVector, VersionStamp};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

/// Region-side hooks and facts consumed by [`EntryMap`](crate::EntryMap).
pub trait RegionOwner<K: Debug, V>: Send + Sync {
    /// Full path of the region, used in logs.
    fn region_path(&self) -> &str;

    fn is_initialized(&self) -> bool;

    fn concurrency_checks_enabled(&self) -> bool;

    fn data_policy(&self) -> DataPolicy;

    fn version_vector(&self) -> Option<SharedVersionVector>;

    fn cache_perf_stats(&self) -> &CachePerfStats;

    /// Called when an operation needs a live entry and there is none.
    /// Returning `Ok` turns the failure into a no-op.
    fn check_entry_not_found(&self, key: &K) -> Result<()> {
        Err(EntryError::entry_not_found(key))
    }

    /// Assign a version tag to a local operation. Called with the entry's
    /// current stamp while the entry is locked.
    fn generate_version_tag(&self, _event: &mut EntryEvent<K, V>, _stamp: &VersionStamp) {}

    /// An entry was invalidated. Runs while the entry is locked.
    fn basic_invalidate_part2(
        &self,
        entry: &RegionEntry<K, V>,
        event: &EntryEvent<K, V>,
        conflict_with_clear: bool,
        invoke_callbacks: bool,
    );

    /// An entry was destroyed. Runs while the entry is locked.
    fn basic_destroy_part2(
        &self,
        entry: Option<&RegionEntry<K, V>>,
        event: &EntryEvent<K, V>,
        in_token_mode: bool,
        conflict_with_clear: bool,
        during_ri: bool,
        invoke_callbacks: bool,
    );

    /// A destroy completed. Runs after the entry lock is released.
    fn basic_destroy_part3(
        &self,
        entry: Option<&RegionEntry<K, V>>,
        event: &EntryEvent<K, V>,
        in_token_mode: bool,
        during_ri: bool,
        invoke_callbacks: bool,
        expected_old_value: Option<&V>,
    );

    /// Notify invalidate listeners without an entry change.
    fn invoke_invalidate_callbacks(&self, event: &EntryEvent<K, V>, invoke_callbacks: bool);

    /// A put was applied. Runs while the entry is locked.
    fn basic_put_part2(&self, _entry: &RegionEntry<K, V>, _event: &EntryEvent<K, V>, _is_create: bool) {
    }

    /// A transactional operation was applied. Runs while the entry is locked.
    fn tx_apply_part2(&self, _entry: &RegionEntry<K, V>, _event: &EntryEvent<K, V>) {}
}

/// Cache-wide operation counters.
#[derive(Debug, Default)]
pub struct CachePerfStats {
    puts: AtomicU64,
    invalidates: AtomicU64,
    destroys: AtomicU64,
    tombstones: AtomicU64,
    tombstone_gcs: AtomicU64,
    evictions: AtomicU64,
    retries: AtomicU64,
    clears: AtomicU64,
    conflicts: AtomicU64,
}

/// Point-in-time copy of [`CachePerfStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CachePerfSnapshot {
    pub puts: u64,
    pub invalidates: u64,
    pub destroys: u64,
    /// Tombstones currently retained.
    pub tombstones: u64,
    pub tombstone_gcs: u64,
    pub evictions: u64,
    pub retries: u64,
    pub clears: u64,
    pub conflicts: u64,
}

impl CachePerfStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_puts(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_invalidates(&self) {
        self.invalidates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_destroys(&self) {
        self.destroys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tombstone_count(&self, delta: i64) {
        if delta >= 0 {
            self.tombstones.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            let _ = self
                .tombstones
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                    Some(n.saturating_sub(delta.unsigned_abs()))
                });
        }
    }

    pub fn inc_tombstone_gc_count(&self) {
        self.tombstone_gcs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_clears(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CachePerfSnapshot {
        CachePerfSnapshot {
            puts: self.puts.load(Ordering::Relaxed),
            invalidates: self.invalidates.load(Ordering::Relaxed),
            destroys: self.destroys.load(Ordering::Relaxed),
            tombstones: self.tombstones.load(Ordering::Relaxed),
            tombstone_gcs: self.tombstone_gcs.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}
