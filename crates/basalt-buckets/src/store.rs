//! The buckets a member hosts for one partitioned region.

use crate::advisor::BucketAdvisor;
use crate::bucket::BucketRegion;
use crate::config::BucketConfig;
use crate::delegate::VolunteeringDelegate;
use crate::error::{BucketError, Result};
use crate::gate::ClearGate;
use crate::region_advisor::RegionAdvisor;
use basalt_membership::{MemberIdentity, MembershipListener};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, info};

/// What a region clear needs from a hosted bucket.
pub trait ClearableBucket: Send + Sync {
    fn bucket_id(&self) -> u32;

    /// True if some member is primary for the bucket.
    fn has_primary(&self) -> bool;

    fn is_primary(&self) -> bool;

    fn size(&self) -> usize;

    /// Remove the bucket's entries. Returns the number removed.
    fn clear(&self) -> usize;

    fn lock_locally_for_clear(&self, requester: &MemberIdentity);

    fn release_lock_locally_for_clear(&self);
}

/// What a region clear needs from the member's bucket store.
pub trait BucketDataStore: Send + Sync {
    fn all_local_buckets(&self) -> Vec<Arc<dyn ClearableBucket>>;

    fn all_local_primary_buckets(&self) -> Vec<Arc<dyn ClearableBucket>>;

    /// Keep new buckets from being created until unlocked.
    fn lock_bucket_creation_for_region_clear(&self);

    fn unlock_bucket_creation_for_region_clear(&self);
}

impl<K, V> ClearableBucket for BucketRegion<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + PartialEq + Debug + Send + Sync,
{
    fn bucket_id(&self) -> u32 {
        self.id()
    }

    fn has_primary(&self) -> bool {
        self.advisor().has_primary()
    }

    fn is_primary(&self) -> bool {
        self.advisor().is_primary()
    }

    fn size(&self) -> usize {
        BucketRegion::size(self)
    }

    fn clear(&self) -> usize {
        BucketRegion::clear(self)
    }

    fn lock_locally_for_clear(&self, requester: &MemberIdentity) {
        BucketRegion::lock_locally_for_clear(self, requester)
    }

    fn release_lock_locally_for_clear(&self) {
        BucketRegion::release_lock_locally_for_clear(self)
    }
}

/// Buckets of one partitioned region hosted on this member.
pub struct PartitionedRegionDataStore<K, V> {
    local: MemberIdentity,
    region_advisor: Arc<dyn RegionAdvisor>,
    config: BucketConfig,
    buckets: RwLock<BTreeMap<u32, Arc<BucketRegion<K, V>>>>,
    creation_gate: ClearGate,
}

impl<K, V> PartitionedRegionDataStore<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    pub fn new(local: MemberIdentity, region_advisor: Arc<dyn RegionAdvisor>, config: BucketConfig) -> Self {
        PartitionedRegionDataStore {
            local,
            region_advisor,
            config,
            buckets: RwLock::new(BTreeMap::new()),
            creation_gate: ClearGate::new(),
        }
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    pub fn local_member(&self) -> &MemberIdentity {
        &self.local
    }

    /// Host `bucket_id` on this member, or return the bucket already
    /// hosted. Waits while a region clear blocks bucket creation.
    pub fn create_bucket(
        &self,
        bucket_id: u32,
        volunteering: Arc<dyn VolunteeringDelegate>,
    ) -> Result<Arc<BucketRegion<K, V>>> {
        if bucket_id >= self.config.total_buckets {
            return Err(BucketError::NotHosted(bucket_id));
        }
        if !self.creation_gate.pass(self.config.primary_wait()) {
            return Err(BucketError::ClearInProgress(bucket_id));
        }
        let mut buckets = self.buckets.write();
        if let Some(existing) = buckets.get(&bucket_id) {
            return Ok(existing.clone());
        }
        let advisor = BucketAdvisor::new(
            bucket_id,
            self.local.clone(),
            self.region_advisor.clone(),
            volunteering,
        );
        advisor.set_hosting(true);
        advisor.open_initialization_gate();
        let bucket = Arc::new(BucketRegion::new(advisor, self.config.attributes));
        buckets.insert(bucket_id, bucket.clone());
        debug!(region = self.region_advisor.region_path(), bucket = bucket_id, "bucket created");
        Ok(bucket)
    }

    /// Stop hosting `bucket_id`, as when the bucket moves to another member.
    pub fn remove_bucket(&self, bucket_id: u32) -> Option<Arc<BucketRegion<K, V>>> {
        let removed = self.buckets.write().remove(&bucket_id);
        if let Some(bucket) = &removed {
            bucket.advisor().close();
            info!(region = self.region_advisor.region_path(), bucket = bucket_id, "bucket removed");
        }
        removed
    }

    pub fn bucket(&self, bucket_id: u32) -> Option<Arc<BucketRegion<K, V>>> {
        self.buckets.read().get(&bucket_id).cloned()
    }

    pub fn bucket_ids(&self) -> Vec<u32> {
        self.buckets.read().keys().copied().collect()
    }

    pub fn local_bucket_regions(&self) -> Vec<Arc<BucketRegion<K, V>>> {
        self.buckets.read().values().cloned().collect()
    }

    pub fn local_primary_bucket_regions(&self) -> Vec<Arc<BucketRegion<K, V>>> {
        self.buckets
            .read()
            .values()
            .filter(|b| b.advisor().is_primary())
            .cloned()
            .collect()
    }

    /// Entries across all local buckets.
    pub fn size(&self) -> usize {
        self.buckets.read().values().map(|b| b.size()).sum()
    }

    pub fn is_bucket_creation_locked(&self) -> bool {
        self.creation_gate.is_closed()
    }

    pub fn tombstone_count(&self) -> usize {
        self.buckets.read().values().map(|b| b.tombstone_count()).sum()
    }

    /// Expire old tombstones in every local bucket.
    pub fn expire_tombstones(&self, now_ms: i64) -> usize {
        let collected: usize = self
            .local_bucket_regions()
            .iter()
            .map(|bucket| bucket.expire_tombstones(now_ms))
            .sum();
        if collected > 0 {
            debug!(region = self.region_advisor.region_path(), collected, "tombstone sweep");
        }
        collected
    }
}

impl<K, V> BucketDataStore for PartitionedRegionDataStore<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn all_local_buckets(&self) -> Vec<Arc<dyn ClearableBucket>> {
        self.local_bucket_regions()
            .into_iter()
            .map(|b| b as Arc<dyn ClearableBucket>)
            .collect()
    }

    fn all_local_primary_buckets(&self) -> Vec<Arc<dyn ClearableBucket>> {
        self.local_primary_bucket_regions()
            .into_iter()
            .map(|b| b as Arc<dyn ClearableBucket>)
            .collect()
    }

    fn lock_bucket_creation_for_region_clear(&self) {
        self.creation_gate.close(&self.local);
    }

    fn unlock_bucket_creation_for_region_clear(&self) {
        self.creation_gate.open();
    }
}

impl<K, V> MembershipListener for PartitionedRegionDataStore<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn member_departed(&self, member: &MemberIdentity, crashed: bool) {
        for bucket in self.local_bucket_regions() {
            bucket.advisor().member_departed(member, crashed);
        }
    }
}
