//! One bucket's share of a partitioned region.
//!
//! A [`BucketRegion`] owns the entry map of a bucket together with its
//! advisor. Operations that originate on this member are only accepted by
//! the primary; operations forwarded from the primary are applied by every
//! copy. While a clear holds the bucket's clear gate, operations wait.

use crate::advisor::BucketAdvisor;
use crate::error::{BucketError, Result};
use crate::gate::ClearGate;
use basalt_entries::{
    CachePerfStats, DataPolicy, DestroyOptions, EntryEvent, EntryMap, OperationConfig, Operation,
    PutOptions, RegionAttributes, RegionEntry, RegionOwner,
};
use basalt_membership::MemberIdentity;
use basalt_versions::{RegionVersionVector, SharedVersionVector, VersionStamp};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_GATE_WAIT: Duration = Duration::from_secs(15);

/// A bucket hosted on this member.
pub struct BucketRegion<K, V> {
    path: String,
    advisor: Arc<BucketAdvisor>,
    attributes: RegionAttributes,
    entries: EntryMap<K, V>,
    rvv: Option<SharedVersionVector>,
    stats: CachePerfStats,
    clear_gate: ClearGate,
    gate_wait: Duration,
    clears: AtomicU64,
}

impl<K, V> BucketRegion<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + PartialEq + Debug + Send + Sync,
{
    pub fn new(advisor: Arc<BucketAdvisor>, attributes: RegionAttributes) -> Self {
        let path = format!("{}/bucket-{}", advisor.region_path(), advisor.bucket_id());
        let rvv = attributes
            .concurrency_checks_enabled
            .then(|| RegionVersionVector::new(advisor.local_member().clone()).into_shared());
        BucketRegion {
            path,
            entries: EntryMap::new(attributes.tombstone),
            advisor,
            attributes,
            rvv,
            stats: CachePerfStats::new(),
            clear_gate: ClearGate::new(),
            gate_wait: DEFAULT_GATE_WAIT,
            clears: AtomicU64::new(0),
        }
    }

    /// How long operations wait for a clear to finish.
    pub fn with_gate_wait(mut self, wait: Duration) -> Self {
        self.gate_wait = wait;
        self
    }

    pub fn id(&self) -> u32 {
        self.advisor.bucket_id()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn advisor(&self) -> &Arc<BucketAdvisor> {
        &self.advisor
    }

    pub fn entries(&self) -> &EntryMap<K, V> {
        &self.entries
    }

    pub fn stats(&self) -> &CachePerfStats {
        &self.stats
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key)
    }

    /// Apply `event` to this bucket.
    ///
    /// A local event requires this member to be primary; the tag assigned
    /// to it is left on the event so it can be forwarded to the other
    /// copies, which apply it as a remote event.
    pub fn apply(&self, event: &mut EntryEvent<K, V>) -> Result<bool> {
        if !event.is_origin_remote() {
            self.check_primary()?;
        }
        if !self.clear_gate.pass(self.gate_wait) {
            return Err(BucketError::ClearInProgress(self.id()));
        }
        let config = OperationConfig::default();
        let applied = match event.operation() {
            Operation::Create | Operation::Update => {
                self.entries.put(self, event, &PutOptions::default(), &config)?
            }
            Operation::Invalidate | Operation::LocalInvalidate => {
                self.entries.invalidate(self, event, false, false, &config)?
            }
            Operation::Destroy => {
                self.entries
                    .destroy(self, event, &config, &DestroyOptions::default())?
            }
            Operation::Evict => {
                self.entries
                    .destroy(self, event, &config, &DestroyOptions::eviction())?
            }
            Operation::RegionClear => {
                self.clear();
                true
            }
        };
        Ok(applied)
    }

    pub fn put(&self, key: K, value: V) -> Result<EntryEvent<K, V>> {
        let mut event = EntryEvent::put(key, value);
        self.apply(&mut event)?;
        Ok(event)
    }

    pub fn destroy(&self, key: K) -> Result<EntryEvent<K, V>> {
        let mut event = EntryEvent::destroy(key);
        self.apply(&mut event)?;
        Ok(event)
    }

    pub fn invalidate(&self, key: K) -> Result<EntryEvent<K, V>> {
        let mut event = EntryEvent::invalidate(key);
        self.apply(&mut event)?;
        Ok(event)
    }

    /// Remove every entry whose version this bucket has seen. Entries
    /// written concurrently with the clear survive it.
    pub fn clear(&self) -> usize {
        let snapshot = self.rvv.as_ref().map(|rvv| rvv.read().clone());
        let cleared = self.entries.clear(self, snapshot.as_ref());
        self.clears.fetch_add(1, Ordering::Relaxed);
        debug!(bucket = %self.path, cleared, "bucket cleared");
        cleared
    }

    pub fn tombstone_count(&self) -> usize {
        self.entries.tombstone_count()
    }

    /// Collect tombstones older than the configured timeout.
    pub fn expire_tombstones(&self, now_ms: i64) -> usize {
        self.entries.expire_tombstones(self, now_ms)
    }

    /// Collect tombstones whose versions `gc_vector` allows collecting.
    pub fn gc_tombstones(&self, gc_vector: &RegionVersionVector) -> usize {
        self.entries.gc_tombstones(self, gc_vector)
    }

    /// Number of times this bucket was cleared.
    pub fn clear_count(&self) -> u64 {
        self.clears.load(Ordering::Relaxed)
    }

    /// Hold off operations on this bucket until
    /// [`release_lock_locally_for_clear`](Self::release_lock_locally_for_clear).
    pub fn lock_locally_for_clear(&self, requester: &MemberIdentity) {
        self.clear_gate.close(requester);
    }

    pub fn release_lock_locally_for_clear(&self) {
        if let Some(holder) = self.clear_gate.open() {
            trace!(bucket = %self.path, holder = %holder, "clear lock released");
        }
    }

    pub fn is_locked_for_clear(&self) -> bool {
        self.clear_gate.is_closed()
    }

    fn check_primary(&self) -> Result<()> {
        if self.advisor.is_closed() {
            return Err(BucketError::Closed(self.id()));
        }
        if !self.advisor.is_hosting() {
            return Err(BucketError::NotHosted(self.id()));
        }
        if !self.advisor.is_primary() {
            return Err(BucketError::NotPrimary {
                bucket_id: self.id(),
                primary: self.advisor.primary_member().map(|m| m.to_string()),
            });
        }
        Ok(())
    }
}

impl<K, V> RegionOwner<K, V> for BucketRegion<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + PartialEq + Debug + Send + Sync,
{
    fn region_path(&self) -> &str {
        &self.path
    }

    fn is_initialized(&self) -> bool {
        self.advisor.initialization_gate()
    }

    fn concurrency_checks_enabled(&self) -> bool {
        self.attributes.concurrency_checks_enabled
    }

    fn data_policy(&self) -> DataPolicy {
        DataPolicy::Partition
    }

    fn version_vector(&self) -> Option<SharedVersionVector> {
        self.rvv.clone()
    }

    fn cache_perf_stats(&self) -> &CachePerfStats {
        &self.stats
    }

    fn generate_version_tag(&self, event: &mut EntryEvent<K, V>, stamp: &VersionStamp) {
        if let Some(rvv) = &self.rvv {
            let region_version = rvv.write().next_region_version();
            event.set_version_tag(Some(
                stamp.next_tag(self.advisor.local_member().clone(), region_version),
            ));
        }
    }

    fn basic_invalidate_part2(
        &self,
        entry: &RegionEntry<K, V>,
        _event: &EntryEvent<K, V>,
        _conflict_with_clear: bool,
        _invoke_callbacks: bool,
    ) {
        trace!(bucket = %self.path, key = ?entry.key(), "invalidated");
    }

    fn basic_destroy_part2(
        &self,
        entry: Option<&RegionEntry<K, V>>,
        _event: &EntryEvent<K, V>,
        _in_token_mode: bool,
        _conflict_with_clear: bool,
        _during_ri: bool,
        _invoke_callbacks: bool,
    ) {
        trace!(bucket = %self.path, key = ?entry.map(|e| e.key()), "destroyed");
    }

    fn basic_destroy_part3(
        &self,
        _entry: Option<&RegionEntry<K, V>>,
        _event: &EntryEvent<K, V>,
        _in_token_mode: bool,
        _during_ri: bool,
        _invoke_callbacks: bool,
        _expected_old_value: Option<&V>,
    ) {
    }

    fn invoke_invalidate_callbacks(&self, event: &EntryEvent<K, V>, _invoke_callbacks: bool) {
        trace!(bucket = %self.path, key = ?event.key(), "invalidate callbacks");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region_advisor::RegionAdvisor;
    use basalt_entries::TombstoneConfig;
    use chrono::Utc;
    use std::net::{IpAddr, Ipv4Addr};

    fn member(port: u16) -> MemberIdentity {
        MemberIdentity::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    struct SingleHost;

    impl RegionAdvisor for SingleHost {
        fn region_path(&self) -> &str {
            "/orders"
        }

        fn redundant_copies(&self) -> u32 {
            0
        }

        fn has_partitioned_region(&self, _member: &MemberIdentity) -> bool {
            true
        }

        fn partitioned_region_members(&self) -> Vec<MemberIdentity> {
            vec![member(1)]
        }
    }

    fn primary_bucket() -> BucketRegion<String, u32> {
        let advisor = BucketAdvisor::with_immediate_volunteering(7, member(1), Arc::new(SingleHost));
        advisor.open_initialization_gate();
        advisor.set_hosting(true);
        advisor.volunteer_for_primary();
        BucketRegion::new(advisor, RegionAttributes::default())
    }

    #[test]
    fn test_primary_assigns_versions() {
        let bucket = primary_bucket();
        assert_eq!(bucket.path(), "/orders/bucket-7");
        let event = bucket.put("a".to_string(), 1).unwrap();
        let tag = event.version_tag().unwrap();
        assert_eq!(tag.member(), &member(1));
        assert_eq!(tag.region_version(), 1);
        assert_eq!(bucket.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn test_secondary_rejects_local_operations() {
        let advisor = BucketAdvisor::with_immediate_volunteering(1, member(1), Arc::new(SingleHost));
        advisor.set_hosting(true);
        advisor.set_primary_member(Some(member(2)));
        let bucket: BucketRegion<String, u32> = BucketRegion::new(advisor, RegionAttributes::default());

        let err = bucket.put("a".to_string(), 1).unwrap_err();
        assert!(matches!(err, BucketError::NotPrimary { bucket_id: 1, .. }));
    }

    #[test]
    fn test_secondary_applies_forwarded_events() {
        let primary = primary_bucket();
        let advisor = BucketAdvisor::with_immediate_volunteering(7, member(2), Arc::new(SingleHost));
        advisor.set_hosting(true);
        advisor.set_primary_member(Some(member(1)));
        let secondary: BucketRegion<String, u32> = BucketRegion::new(advisor, RegionAttributes::default());

        let mut event = primary.put("a".to_string(), 1).unwrap();
        event.set_origin_remote(true);
        assert!(secondary.apply(&mut event).unwrap());

        let mut destroy = primary.destroy("a".to_string()).unwrap();
        destroy.set_origin_remote(true);
        assert!(secondary.apply(&mut destroy).unwrap());
        assert_eq!(secondary.get(&"a".to_string()), None);
        assert_eq!(secondary.entries().tombstone_count(), 1);
    }

    #[test]
    fn test_clear_and_gate() {
        let bucket = primary_bucket().with_gate_wait(Duration::from_millis(10));
        bucket.put("a".to_string(), 1).unwrap();
        bucket.put("b".to_string(), 2).unwrap();

        bucket.lock_locally_for_clear(&member(3));
        assert!(bucket.is_locked_for_clear());
        assert!(matches!(
            bucket.put("c".to_string(), 3),
            Err(BucketError::ClearInProgress(7))
        ));
        assert_eq!(bucket.clear(), 2);
        bucket.release_lock_locally_for_clear();

        assert_eq!(bucket.size(), 0);
        assert_eq!(bucket.clear_count(), 1);
        bucket.put("c".to_string(), 3).unwrap();
        assert_eq!(bucket.size(), 1);
    }

    #[test]
    fn test_tombstones_expire_after_timeout() {
        let advisor = BucketAdvisor::with_immediate_volunteering(7, member(1), Arc::new(SingleHost));
        advisor.open_initialization_gate();
        advisor.set_hosting(true);
        advisor.volunteer_for_primary();
        let tombstone = TombstoneConfig {
            timeout_ms: 1_000,
            expired_batch_limit: 10,
        };
        let bucket: BucketRegion<String, u32> =
            BucketRegion::new(advisor, RegionAttributes::default().with_tombstone(tombstone));
        bucket.put("a".to_string(), 1).unwrap();
        bucket.destroy("a".to_string()).unwrap();
        assert_eq!(bucket.tombstone_count(), 1);

        let now = Utc::now().timestamp_millis();
        assert_eq!(bucket.expire_tombstones(now), 0);
        assert_eq!(bucket.tombstone_count(), 1);

        assert_eq!(bucket.expire_tombstones(now + 1_000), 1);
        assert_eq!(bucket.tombstone_count(), 0);
        assert!(!bucket.entries().contains_slot(&"a".to_string()));
        assert_eq!(bucket.stats().snapshot().tombstone_gcs, 1);
    }

    #[test]
    fn test_tombstones_collected_by_gc_vector() {
        let bucket = primary_bucket();
        let tag = bucket.put("a".to_string(), 1).unwrap();
        let destroyed = bucket.destroy("a".to_string()).unwrap();
        assert_eq!(bucket.tombstone_count(), 1);

        let mut gc = RegionVersionVector::new(member(1));
        let put_version = tag.version_tag().unwrap().region_version();
        gc.record_gc_version(&member(1), put_version);
        assert_eq!(bucket.gc_tombstones(&gc), 0);

        let destroy_version = destroyed.version_tag().unwrap().region_version();
        gc.record_gc_version(&member(1), destroy_version);
        assert_eq!(bucket.gc_tombstones(&gc), 1);
        assert_eq!(bucket.tombstone_count(), 0);
    }
}
