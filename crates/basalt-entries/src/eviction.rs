//! LRU eviction for entry maps.
//!
//! Eviction is layered on top of [`EntryMap`] by composition: an
//! [`LruEntryMap`] holds a map and an [`EvictionController`] and evicts by
//! issuing ordinary destroys flagged as evictions.

use crate::config::{DestroyOptions, OperationConfig, PutOptions};
use crate::error::Result;
use crate::event::EntryEvent;
use crate::map::EntryMap;
use crate::owner::RegionOwner;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Decides when a map holds too many entries.
pub trait EvictionController: Send + Sync {
    /// Maximum number of present entries.
    fn limit(&self) -> usize;

    fn must_evict(&self, entry_count: usize) -> bool {
        entry_count > self.limit()
    }

    fn record_eviction(&self);

    fn evictions(&self) -> u64;
}

/// Entry-count limit with least-recently-modified victims.
#[derive(Debug)]
pub struct LruEntryController {
    limit: usize,
    evictions: AtomicU64,
}

impl LruEntryController {
    pub fn new(limit: usize) -> Self {
        LruEntryController {
            limit,
            evictions: AtomicU64::new(0),
        }
    }
}

impl EvictionController for LruEntryController {
    fn limit(&self) -> usize {
        self.limit
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// An entry map that can evict.
pub trait EvictableEntryMap<K, V> {
    fn entries(&self) -> &EntryMap<K, V>;

    fn eviction_controller(&self) -> &dyn EvictionController;

    /// Evict least recently modified entries until the controller is
    /// satisfied. Returns the number evicted.
    fn evict_lru(&self, owner: &dyn RegionOwner<K, V>) -> Result<usize>;
}

/// [`EntryMap`] plus an [`EvictionController`].
pub struct LruEntryMap<K, V> {
    map: EntryMap<K, V>,
    controller: Box<dyn EvictionController>,
}

impl<K, V> LruEntryMap<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + PartialEq + Debug + Send + Sync,
{
    pub fn new(map: EntryMap<K, V>, controller: Box<dyn EvictionController>) -> Self {
        LruEntryMap { map, controller }
    }

    /// Put, then evict if the map grew past its limit.
    pub fn put(
        &self,
        owner: &dyn RegionOwner<K, V>,
        event: &mut EntryEvent<K, V>,
        options: &PutOptions<V>,
        config: &OperationConfig,
    ) -> Result<bool> {
        let applied = self.map.put(owner, event, options, config)?;
        if applied {
            self.evict_lru(owner)?;
        }
        Ok(applied)
    }
}

impl<K, V> EvictableEntryMap<K, V> for LruEntryMap<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + PartialEq + Debug + Send + Sync,
{
    fn entries(&self) -> &EntryMap<K, V> {
        &self.map
    }

    fn eviction_controller(&self) -> &dyn EvictionController {
        self.controller.as_ref()
    }

    fn evict_lru(&self, owner: &dyn RegionOwner<K, V>) -> Result<usize> {
        let mut evicted = 0;
        while self.controller.must_evict(self.map.len()) {
            let Some(victim) = self.map.lru_candidate() else {
                break;
            };
            let mut event = EntryEvent::evict(victim);
            let destroyed = self.map.destroy(
                owner,
                &mut event,
                &OperationConfig::default(),
                &DestroyOptions::eviction(),
            )?;
            if !destroyed {
                break;
            }
            self.controller.record_eviction();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(region = owner.region_path(), evicted, "evicted entries");
        }
        Ok(evicted)
    }
}
