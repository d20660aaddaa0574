//! What a clear needs from the region it clears.

use crate::error::Result;
use crate::event::{ListenerEvent, RegionEvent};
use crate::node_set::PersistedNodeSet;
use basalt_buckets::BucketDataStore;
use basalt_membership::DistributedLockService;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A partitioned region as seen by its [`ClearCoordinator`].
///
/// [`ClearCoordinator`]: crate::ClearCoordinator
pub trait ClearableRegion: Send + Sync {
    fn name(&self) -> &str;

    fn total_bucket_count(&self) -> u32;

    /// Buckets stored on this member. `None` on members that store no
    /// data for the region.
    fn data_store(&self) -> Option<Arc<dyn BucketDataStore>>;

    /// The cluster-wide lock service that serializes clears.
    fn lock_service(&self) -> Arc<dyn DistributedLockService>;

    fn persisted_nodes(&self) -> PersistedNodeSet;

    fn has_listener(&self) -> bool;

    /// Subscribed clients whose interest covers this region.
    fn interested_clients(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn has_any_clients_interested(&self) -> bool {
        !self.interested_clients().is_empty()
    }

    fn dispatch_listener_event(&self, kind: ListenerEvent, event: &RegionEvent);

    fn notify_bridge_clients(&self, event: &RegionEvent);

    /// Ask the region's cache writer whether the clear may go ahead.
    fn invoke_cache_writer(&self, event: &RegionEvent) -> Result<()>;

    /// Make sure every bucket of the region has a primary.
    fn assign_all_primary_buckets(&self) -> Result<()>;
}

/// Callbacks for region-level events.
pub trait RegionListener: Send + Sync {
    fn after_region_clear(&self, event: &RegionEvent);
}

/// Vetoes region operations before they happen.
pub trait CacheWriter: Send + Sync {
    /// Return an error to stop the clear.
    fn before_region_clear(&self, event: &RegionEvent) -> std::result::Result<(), String>;
}
