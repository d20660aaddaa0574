//! An in-memory partitioned region spread over simulated members.
//!
//! A [`RegionCluster`] holds what the members of one region share: the
//! membership view, the message fabric, the lock grantor and the persisted
//! node set. Each member joins with [`RegionCluster::add_member`] and gets
//! a [`PartitionedRegion`] handle: its own buckets, listeners, client
//! subscriptions and clear coordinator.

use crate::config::ClearConfig;
use crate::coordinator::ClearCoordinator;
use crate::distribution::ClearMessageHandler;
use crate::error::{ClearError, Result};
use crate::event::{ListenerEvent, RegionEvent};
use crate::fabric::LoopbackFabric;
use crate::node_set::PersistedNodeSet;
use crate::region::{CacheWriter, ClearableRegion, RegionListener};
use basalt_buckets::{
    BucketConfig, BucketDataStore, BucketError, BucketRegion, ImmediateVolunteering,
    MembershipRegionAdvisor, PartitionedRegionDataStore,
};
use basalt_membership::{DistributedLockService, LockGrantor, MemberIdentity, MembershipView};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Node set shared by the members of a simulated cluster.
pub type SharedNodeSet = Arc<RwLock<PersistedNodeSet>>;

/// A client notification queued for delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientNotification {
    pub client: String,
    pub event: RegionEvent,
}

/// The member-local state of a partitioned region.
pub struct LocalRegion<K, V> {
    name: String,
    member: MemberIdentity,
    config: BucketConfig,
    data_store: Arc<PartitionedRegionDataStore<K, V>>,
    lock_service: Arc<dyn DistributedLockService>,
    nodes: SharedNodeSet,
    listeners: RwLock<Vec<Arc<dyn RegionListener>>>,
    interested_clients: RwLock<BTreeSet<String>>,
    client_queue: Mutex<Vec<ClientNotification>>,
    cache_writer: RwLock<Option<Arc<dyn CacheWriter>>>,
}

impl<K, V> LocalRegion<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        member: MemberIdentity,
        config: BucketConfig,
        region_advisor: Arc<MembershipRegionAdvisor>,
        lock_service: Arc<dyn DistributedLockService>,
        nodes: SharedNodeSet,
    ) -> Self {
        let data_store = Arc::new(PartitionedRegionDataStore::new(
            member.clone(),
            region_advisor,
            config.clone(),
        ));
        LocalRegion {
            name: name.into(),
            member,
            config,
            data_store,
            lock_service,
            nodes,
            listeners: RwLock::new(Vec::new()),
            interested_clients: RwLock::new(BTreeSet::new()),
            client_queue: Mutex::new(Vec::new()),
            cache_writer: RwLock::new(None),
        }
    }

    pub fn member(&self) -> &MemberIdentity {
        &self.member
    }

    pub fn buckets(&self) -> &Arc<PartitionedRegionDataStore<K, V>> {
        &self.data_store
    }
}

impl<K, V> ClearableRegion for LocalRegion<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn total_bucket_count(&self) -> u32 {
        self.config.total_buckets
    }

    fn data_store(&self) -> Option<Arc<dyn BucketDataStore>> {
        Some(self.data_store.clone())
    }

    fn lock_service(&self) -> Arc<dyn DistributedLockService> {
        self.lock_service.clone()
    }

    fn persisted_nodes(&self) -> PersistedNodeSet {
        self.nodes.read().clone()
    }

    fn has_listener(&self) -> bool {
        !self.listeners.read().is_empty()
    }

    fn interested_clients(&self) -> BTreeSet<String> {
        self.interested_clients.read().clone()
    }

    fn dispatch_listener_event(&self, kind: ListenerEvent, event: &RegionEvent) {
        let listeners: Vec<_> = self.listeners.read().clone();
        for listener in listeners {
            match kind {
                ListenerEvent::AfterRegionClear => listener.after_region_clear(event),
            }
        }
    }

    fn notify_bridge_clients(&self, event: &RegionEvent) {
        let Some(info) = event.local_filter_info() else {
            return;
        };
        let mut queue = self.client_queue.lock();
        for client in &info.clients {
            queue.push(ClientNotification {
                client: client.clone(),
                event: event.clone(),
            });
        }
        debug!(region = %self.name, clients = info.clients.len(), "queued clear for clients");
    }

    fn invoke_cache_writer(&self, event: &RegionEvent) -> Result<()> {
        let writer = self.cache_writer.read().clone();
        match writer {
            Some(writer) => writer
                .before_region_clear(event)
                .map_err(ClearError::CacheWriter),
            None => Ok(()),
        }
    }

    fn assign_all_primary_buckets(&self) -> Result<()> {
        for bucket in self.data_store.local_bucket_regions() {
            let advisor = bucket.advisor();
            if !advisor.has_primary() && advisor.volunteer_for_primary() {
                debug!(region = %self.name, bucket = bucket.id(), "assigned primary before clear");
            }
        }
        Ok(())
    }
}

/// One member's handle on a partitioned region.
pub struct PartitionedRegion<K, V> {
    local: Arc<LocalRegion<K, V>>,
    coordinator: Arc<ClearCoordinator>,
}

impl<K, V> PartitionedRegion<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    pub fn name(&self) -> &str {
        &self.local.name
    }

    pub fn member(&self) -> &MemberIdentity {
        &self.local.member
    }

    pub fn local_region(&self) -> &Arc<LocalRegion<K, V>> {
        &self.local
    }

    pub fn coordinator(&self) -> &Arc<ClearCoordinator> {
        &self.coordinator
    }

    /// The bucket `key` belongs to.
    pub fn bucket_id_for(&self, key: &K) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.local.config.total_buckets.max(1))) as u32
    }

    /// Host `bucket_id` here and volunteer as its primary.
    pub fn host_bucket(&self, bucket_id: u32) -> Result<Arc<BucketRegion<K, V>>> {
        let bucket = self
            .local
            .data_store
            .create_bucket(bucket_id, Arc::new(ImmediateVolunteering))?;
        bucket.advisor().volunteer_for_primary();
        Ok(bucket)
    }

    pub fn hosts(&self, key: &K) -> bool {
        self.local.data_store.bucket(self.bucket_id_for(key)).is_some()
    }

    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.hosting_bucket(&key)?.put(key, value)?;
        Ok(())
    }

    pub fn destroy(&self, key: K) -> Result<()> {
        self.hosting_bucket(&key)?.destroy(key)?;
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.local
            .data_store
            .bucket(self.bucket_id_for(key))
            .and_then(|bucket| bucket.get(key))
    }

    /// Entries stored on this member.
    pub fn local_size(&self) -> usize {
        self.local.data_store.size()
    }

    /// Tombstones retained on this member.
    pub fn tombstone_count(&self) -> usize {
        self.local.data_store.tombstone_count()
    }

    /// Collect the tombstones of hosted buckets that are older than the
    /// configured tombstone timeout.
    pub fn sweep_tombstones(&self) -> usize {
        self.sweep_tombstones_at(Utc::now().timestamp_millis())
    }

    pub fn sweep_tombstones_at(&self, now_ms: i64) -> usize {
        self.local.data_store.expire_tombstones(now_ms)
    }

    pub fn add_listener(&self, listener: Arc<dyn RegionListener>) {
        self.local.listeners.write().push(listener);
    }

    pub fn register_interest(&self, client: impl Into<String>) {
        self.local.interested_clients.write().insert(client.into());
    }

    pub fn set_cache_writer(&self, writer: Option<Arc<dyn CacheWriter>>) {
        *self.local.cache_writer.write() = writer;
    }

    /// Drain the notifications queued for subscribed clients.
    pub fn take_client_notifications(&self) -> Vec<ClientNotification> {
        std::mem::take(&mut *self.local.client_queue.lock())
    }

    /// Clear the region on every member, consulting the cache writer first.
    pub fn clear(&self) -> Result<Vec<u32>> {
        let event = RegionEvent::clear(self.name(), self.member().clone());
        self.coordinator.do_clear(&event, true)
    }

    fn hosting_bucket(&self, key: &K) -> Result<Arc<BucketRegion<K, V>>> {
        let bucket_id = self.bucket_id_for(key);
        self.local
            .data_store
            .bucket(bucket_id)
            .ok_or(ClearError::Bucket(BucketError::NotHosted(bucket_id)))
    }
}

/// What the members of one simulated region share.
pub struct RegionCluster {
    name: String,
    view: Arc<MembershipView>,
    fabric: LoopbackFabric,
    grantor: LockGrantor,
    region_advisor: Arc<MembershipRegionAdvisor>,
    nodes: SharedNodeSet,
    bucket_config: BucketConfig,
    clear_config: ClearConfig,
}

impl RegionCluster {
    pub fn new(name: impl Into<String>, bucket_config: BucketConfig, clear_config: ClearConfig) -> Self {
        let name = name.into();
        let view = Arc::new(MembershipView::new());
        let grantor = LockGrantor::new();
        view.add_listener(Arc::new(grantor.clone()));
        let region_advisor = Arc::new(MembershipRegionAdvisor::new(
            format!("/{}", name),
            bucket_config.redundant_copies,
            view.clone(),
        ));
        view.add_listener(region_advisor.clone());
        RegionCluster {
            fabric: LoopbackFabric::new(view.clone()),
            name,
            view,
            grantor,
            region_advisor,
            nodes: Arc::new(RwLock::new(PersistedNodeSet::new())),
            bucket_config,
            clear_config,
        }
    }

    pub fn view(&self) -> &Arc<MembershipView> {
        &self.view
    }

    pub fn fabric(&self) -> &LoopbackFabric {
        &self.fabric
    }

    pub fn nodes(&self) -> PersistedNodeSet {
        self.nodes.read().clone()
    }

    /// Join `member` to the cluster and create its share of the region.
    pub fn add_member<K, V>(&self, member: MemberIdentity) -> PartitionedRegion<K, V>
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        V: Clone + PartialEq + Debug + Send + Sync + 'static,
    {
        self.view.join(member.clone());
        self.region_advisor.add_host(member.clone());
        self.nodes.write().add_node(member.clone());

        let local = Arc::new(LocalRegion::new(
            self.name.clone(),
            member.clone(),
            self.bucket_config.clone(),
            self.region_advisor.clone(),
            Arc::new(self.grantor.handle(member.clone())),
            self.nodes.clone(),
        ));
        self.view.add_listener(local.data_store.clone());

        let coordinator = ClearCoordinator::new(
            local.clone(),
            Arc::new(self.fabric.channel(member.clone())),
            self.clear_config.clone(),
        );
        let handler: Weak<dyn ClearMessageHandler> = Arc::downgrade(&(coordinator.clone() as Arc<dyn ClearMessageHandler>));
        self.fabric.register(member.clone(), handler);
        info!(region = %self.name, member = %member, "member joined region");

        PartitionedRegion { local, coordinator }
    }

    /// Remove `member` from the cluster as if it crashed.
    pub fn crash(&self, member: &MemberIdentity) {
        self.fabric.unregister(member);
        self.nodes.write().remove_node(member);
        self.view.depart(member, true);
    }
}
