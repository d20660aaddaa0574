//! The concurrent per-key entry map.
//!
//! Every key maps to its own locked slot. Operations take the map lock only
//! long enough to find or install a slot, then work under the slot's lock,
//! so operations on different keys never wait on each other.
//!
//! A new key is installed as a `RemovedPhase1` placeholder and only becomes
//! visible once an operation gives it a real state. Removal marks the slot
//! `RemovedPhase2` before detaching it; an operation that locks a slot and
//! finds it in that state detaches it (if still present) and retries.
//!
//! Lock order is slot, then map, then tombstone queue. No code path locks
//! a slot while holding the map lock.

use crate::config::{DestroyOptions, OperationConfig, PutOptions, TombstoneConfig};
use crate::entry::{RegionEntry, RegionId};
use crate::error::{EntryError, Result};
use crate::event::{EntryEvent, Operation};
use crate::owner::RegionOwner;
use crate::token::{Token, TokenKind};
use crate::tombstone::{TombstoneQueue, TombstoneRecord};
use basalt_versions::{
    check_absent_key, check_for_conflict, ConflictOutcome, RegionVersionVector, VersionTag,
};
use chrono::Utc;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

type Slot<K, V> = Arc<Mutex<RegionEntry<K, V>>>;
type EntryGuard<K, V> = ArcMutexGuard<RawMutex, RegionEntry<K, V>>;

/// Entries of one region.
pub struct EntryMap<K, V> {
    region: RegionId,
    tombstone_config: TombstoneConfig,
    slots: RwLock<HashMap<K, Slot<K, V>>>,
    tombstones: Mutex<TombstoneQueue<K>>,
    clock: AtomicU64,
}

impl<K, V> EntryMap<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + PartialEq + Debug + Send + Sync,
{
    pub fn new(tombstone_config: TombstoneConfig) -> Self {
        EntryMap {
            region: RegionId::next(),
            tombstone_config,
            slots: RwLock::new(HashMap::new()),
            tombstones: Mutex::new(TombstoneQueue::new()),
            clock: AtomicU64::new(0),
        }
    }

    pub fn region_id(&self) -> RegionId {
        self.region
    }

    pub fn tombstone_config(&self) -> &TombstoneConfig {
        &self.tombstone_config
    }

    // ---- reads ----

    /// Current value of `key`, if it holds one.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.slot(key)?;
        let entry = slot.lock();
        entry.value().cloned()
    }

    /// True if `key` is present (valid or invalidated).
    pub fn contains_key(&self, key: &K) -> bool {
        self.slot(key)
            .map(|slot| !slot.lock().is_removed())
            .unwrap_or(false)
    }

    /// True if the map holds any slot for `key`, including markers.
    pub fn contains_slot(&self, key: &K) -> bool {
        self.slots.read().contains_key(key)
    }

    /// Raw state of the slot for `key`.
    pub fn token(&self, key: &K) -> Option<TokenKind> {
        self.slot(key).map(|slot| slot.lock().token_kind())
    }

    /// Snapshot of the slot for `key`.
    pub fn entry(&self, key: &K) -> Option<RegionEntry<K, V>> {
        self.slot(key).map(|slot| slot.lock().clone())
    }

    /// Keys that are present, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.snapshot()
            .into_iter()
            .filter(|(_, slot)| !slot.lock().is_removed())
            .map(|(key, _)| key)
            .collect()
    }

    /// Number of present keys.
    pub fn len(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|(_, slot)| !slot.lock().is_removed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots holding a tombstone.
    pub fn tombstone_count(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|(_, slot)| slot.lock().is_tombstone())
            .count()
    }

    /// The present key with a value that was modified least recently.
    pub fn lru_candidate(&self) -> Option<K> {
        self.snapshot()
            .into_iter()
            .filter_map(|(key, slot)| {
                let entry = slot.lock();
                entry.value().map(|_| (entry.last_modified(), key))
            })
            .min_by_key(|(tick, _)| *tick)
            .map(|(_, key)| key)
    }

    /// Install `token` for `key` as received from an initial image,
    /// replacing whatever the slot held.
    pub fn install_token(&self, key: K, token: Token<V>, tag: Option<&VersionTag>) {
        let tick = self.tick();
        let mut entry = RegionEntry::new(key.clone(), token, self.region, tick);
        entry.apply_tag(tag);
        self.slots.write().insert(key, Arc::new(Mutex::new(entry)));
    }

    // ---- operations ----

    /// Invalidate the value of `event.key()`.
    ///
    /// Returns `Ok(true)` if the entry was invalidated and `Ok(false)` if it
    /// already was invalid or a newer version has been applied. An absent
    /// key fails with [`EntryError::EntryNotFound`] unless `force_new_entry`
    /// creates an invalid entry for it.
    pub fn invalidate(
        &self,
        owner: &dyn RegionOwner<K, V>,
        event: &mut EntryEvent<K, V>,
        force_new_entry: bool,
        force_callbacks: bool,
        config: &OperationConfig,
    ) -> Result<bool> {
        let key = event.key().clone();
        let force_callbacks = force_callbacks || config.force_invalidate_event;
        let initializing = !owner.is_initialized() || config.during_initial_image;
        let create = force_new_entry || initializing;

        let locked = if create {
            Some(self.lock_or_create(owner, &key))
        } else {
            self.lock_existing(owner, &key).map(|(slot, entry)| (slot, entry, false))
        };
        let Some((slot, mut entry, created)) = locked else {
            if force_callbacks {
                owner.invoke_invalidate_callbacks(event, config.invoke_callbacks);
            }
            owner.check_entry_not_found(&key)?;
            return Ok(false);
        };

        if entry.is_invalid() {
            drop(entry);
            if force_callbacks && force_new_entry {
                owner.invoke_invalidate_callbacks(event, config.invoke_callbacks);
            }
            return Ok(false);
        }

        if entry.is_removed() && !create {
            drop(entry);
            if force_callbacks {
                owner.invoke_invalidate_callbacks(event, config.invoke_callbacks);
            }
            owner.check_entry_not_found(&key)?;
            return Ok(false);
        }

        if let Err(err) = self.check_version(owner, &entry, event) {
            if created {
                self.remove_entry(&key, &slot, &mut entry);
            }
            return stale_to_false(err);
        }
        self.assign_local_version(owner, &entry, event);

        let was_absent = entry.is_removed();
        let marker = if event.operation().is_local_invalidate() {
            Token::LocalInvalid
        } else {
            Token::Invalid
        };
        let tick = self.tick();
        let old = entry.set_token(marker, tick);
        if matches!(old, Token::Tombstone) {
            owner.cache_perf_stats().inc_tombstone_count(-1);
        }
        event.set_old_value(old.value().cloned());
        entry.apply_tag(event.version_tag());
        self.record_version(owner, event.version_tag());

        if was_absent && !force_new_entry {
            // The marker keeps a later initial image from reviving the key.
            trace!(region = owner.region_path(), key = ?key, "invalid marker created during initialization");
            drop(entry);
            if force_callbacks {
                owner.invoke_invalidate_callbacks(event, config.invoke_callbacks);
            }
            return Err(EntryError::entry_not_found(&key));
        }

        owner.basic_invalidate_part2(&entry, event, false, config.invoke_callbacks);
        owner.cache_perf_stats().inc_invalidates();
        Ok(true)
    }

    /// Destroy `event.key()`.
    ///
    /// Depending on the region and the event this removes the entry, leaves
    /// a `Destroyed` marker (token mode) or a `Tombstone` (versioned destroy
    /// with concurrency checks). On success the owner's destroy hooks run
    /// once each, part 2 under the entry lock and part 3 after it.
    pub fn destroy(
        &self,
        owner: &dyn RegionOwner<K, V>,
        event: &mut EntryEvent<K, V>,
        config: &OperationConfig,
        options: &DestroyOptions<V>,
    ) -> Result<bool> {
        let key = event.key().clone();
        let cc = owner.concurrency_checks_enabled();
        let in_token_mode = config.in_token_mode;
        let remote = event.is_origin_remote();
        let create = in_token_mode || (cc && (remote || options.evict));

        let locked = if create {
            Some(self.lock_or_create(owner, &key))
        } else {
            self.lock_existing(owner, &key).map(|(slot, entry)| (slot, entry, false))
        };
        let Some((slot, mut entry, created)) = locked else {
            if options.evict {
                return Ok(false);
            }
            owner.check_entry_not_found(&key)?;
            return Ok(false);
        };

        if entry.is_removed() {
            if options.evict {
                // A placeholder created here is left behind as RemovedPhase1.
                return Ok(false);
            }
            if in_token_mode {
                let tick = self.tick();
                let old = entry.set_token(Token::Destroyed, tick);
                if matches!(old, Token::Tombstone) {
                    owner.cache_perf_stats().inc_tombstone_count(-1);
                }
                entry.apply_tag(event.version_tag());
                return Ok(self.finish_destroy(owner, event, entry, config, options));
            }
            if cc && remote {
                if let Err(err) = self.check_version(owner, &entry, event) {
                    if created {
                        self.remove_entry(&key, &slot, &mut entry);
                    }
                    return stale_to_false(err);
                }
                if event.has_valid_version() {
                    self.make_tombstone(owner, &key, &mut entry, event);
                } else {
                    // Unversioned remote destroy of an absent key keeps the
                    // RemovedPhase1 entry rather than tombstoning it.
                    debug!(region = owner.region_path(), key = ?key, "unversioned destroy left RemovedPhase1 entry");
                }
                return Ok(self.finish_destroy(owner, event, entry, config, options));
            }
            drop(entry);
            owner.check_entry_not_found(&key)?;
            return Ok(false);
        }

        if let Some(expected) = &options.expected_old_value {
            if entry.value() != Some(expected) {
                trace!(key = ?key, "destroy skipped, old value does not match");
                return Ok(false);
            }
        }
        if let Err(err) = self.check_version(owner, &entry, event) {
            return stale_to_false(err);
        }
        self.assign_local_version(owner, &entry, event);
        event.set_old_value(entry.value().cloned());

        if in_token_mode {
            let tick = self.tick();
            entry.set_token(Token::Destroyed, tick);
            entry.apply_tag(event.version_tag());
        } else if cc && event.has_valid_version() && !options.remove_recovered_entry {
            self.make_tombstone(owner, &key, &mut entry, event);
        } else {
            self.remove_entry(&key, &slot, &mut entry);
            self.record_version(owner, event.version_tag());
        }
        if options.evict {
            owner.cache_perf_stats().inc_evictions();
        }
        Ok(self.finish_destroy(owner, event, entry, config, options))
    }

    /// Put `event.new_value()` for `event.key()`.
    ///
    /// Returns `Ok(false)` when a condition in `options` is not met or a
    /// newer version has already been applied.
    pub fn put(
        &self,
        owner: &dyn RegionOwner<K, V>,
        event: &mut EntryEvent<K, V>,
        options: &PutOptions<V>,
        config: &OperationConfig,
    ) -> Result<bool> {
        let key = event.key().clone();
        let Some(value) = event.new_value().cloned() else {
            return Err(EntryError::InvalidToken {
                key: format!("{:?}", key),
                token: TokenKind::Invalid,
            });
        };

        let (slot, mut entry, created) = self.lock_or_create(owner, &key);
        let is_create = entry.is_removed();
        let expected_mismatch = options
            .expected_old_value
            .as_ref()
            .map(|expected| entry.value() != Some(expected))
            .unwrap_or(false);
        let reject = (options.if_new && !is_create)
            || (options.if_old && is_create)
            || expected_mismatch
            || (config.during_initial_image && entry.token_kind() == TokenKind::Destroyed);
        if reject {
            if created {
                self.remove_entry(&key, &slot, &mut entry);
            }
            return Ok(false);
        }

        if let Err(err) = self.check_version(owner, &entry, event) {
            if created {
                self.remove_entry(&key, &slot, &mut entry);
            }
            return stale_to_false(err);
        }
        self.assign_local_version(owner, &entry, event);

        let tick = self.tick();
        let old = entry.set_token(Token::Valid(value), tick);
        if matches!(old, Token::Tombstone) {
            owner.cache_perf_stats().inc_tombstone_count(-1);
        }
        event.set_old_value(old.value().cloned());
        event.set_operation(if is_create {
            Operation::Create
        } else {
            Operation::Update
        });
        entry.apply_tag(event.version_tag());
        self.record_version(owner, event.version_tag());

        owner.basic_put_part2(&entry, event, is_create);
        owner.cache_perf_stats().inc_puts();
        Ok(true)
    }

    /// Apply a committed transactional put.
    pub fn tx_apply_put(&self, owner: &dyn RegionOwner<K, V>, event: &mut EntryEvent<K, V>) -> Result<bool> {
        let key = event.key().clone();
        let Some(value) = event.new_value().cloned() else {
            return Err(EntryError::InvalidToken {
                key: format!("{:?}", key),
                token: TokenKind::Invalid,
            });
        };
        let (slot, mut entry, created) = self.lock_or_create(owner, &key);
        if let Err(err) = self.check_version(owner, &entry, event) {
            if created {
                self.remove_entry(&key, &slot, &mut entry);
            }
            return stale_to_false(err);
        }

        let is_create = entry.is_removed();
        let tick = self.tick();
        let old = entry.set_token(Token::Valid(value), tick);
        if matches!(old, Token::Tombstone) {
            owner.cache_perf_stats().inc_tombstone_count(-1);
        }
        event.set_old_value(old.value().cloned());
        event.set_operation(if is_create {
            Operation::Create
        } else {
            Operation::Update
        });
        entry.apply_tag(event.version_tag());
        self.record_version(owner, event.version_tag());

        owner.tx_apply_part2(&entry, event);
        owner.cache_perf_stats().inc_puts();
        Ok(true)
    }

    /// Apply a committed transactional invalidate. Removed, destroyed and
    /// tombstoned entries are left exactly as they are.
    pub fn tx_apply_invalidate(
        &self,
        owner: &dyn RegionOwner<K, V>,
        event: &mut EntryEvent<K, V>,
    ) -> Result<bool> {
        let key = event.key().clone();
        let Some(slot) = self.slot(&key) else {
            return Ok(false);
        };
        let mut entry = slot.lock();
        if entry.is_removed() {
            trace!(key = ?key, token = ?entry.token_kind(), "transactional invalidate skipped");
            return Ok(false);
        }
        if entry.is_invalid() {
            return Ok(false);
        }
        if let Err(err) = self.check_version(owner, &entry, event) {
            return stale_to_false(err);
        }

        let marker = if event.operation().is_local_invalidate() {
            Token::LocalInvalid
        } else {
            Token::Invalid
        };
        let tick = self.tick();
        let old = entry.set_token(marker, tick);
        event.set_old_value(old.value().cloned());
        entry.apply_tag(event.version_tag());
        self.record_version(owner, event.version_tag());

        owner.tx_apply_part2(&entry, event);
        owner.cache_perf_stats().inc_invalidates();
        Ok(true)
    }

    /// Apply a committed transactional destroy. Already removed entries are
    /// left unchanged; in token mode an absent key gets a `Destroyed` marker.
    pub fn tx_apply_destroy(
        &self,
        owner: &dyn RegionOwner<K, V>,
        event: &mut EntryEvent<K, V>,
        in_token_mode: bool,
    ) -> Result<bool> {
        let key = event.key().clone();
        let (slot, mut entry, created) = if in_token_mode {
            self.lock_or_create(owner, &key)
        } else {
            match self.lock_existing(owner, &key) {
                Some((slot, entry)) => (slot, entry, false),
                None => return Ok(false),
            }
        };
        if entry.is_removed() && !created {
            return Ok(false);
        }
        if let Err(err) = self.check_version(owner, &entry, event) {
            if created {
                self.remove_entry(&key, &slot, &mut entry);
            }
            return stale_to_false(err);
        }

        event.set_old_value(entry.value().cloned());
        if in_token_mode {
            let tick = self.tick();
            entry.set_token(Token::Destroyed, tick);
            entry.apply_tag(event.version_tag());
        } else if owner.concurrency_checks_enabled() && event.has_valid_version() {
            self.make_tombstone(owner, &key, &mut entry, event);
        } else {
            self.remove_entry(&key, &slot, &mut entry);
            self.record_version(owner, event.version_tag());
        }

        owner.tx_apply_part2(&entry, event);
        owner.cache_perf_stats().inc_destroys();
        Ok(true)
    }

    /// Remove every entry, or with `rvv` only the entries whose version it
    /// has seen. Returns the number of present keys removed.
    pub fn clear(&self, owner: &dyn RegionOwner<K, V>, rvv: Option<&RegionVersionVector>) -> usize {
        let mut cleared = 0;
        for (key, slot) in self.snapshot() {
            let mut entry = slot.lock();
            if entry.token().is_removed_phase2() {
                continue;
            }
            if let (Some(rvv), Some(member)) = (rvv, entry.stamp().member()) {
                if !rvv.contains(member, entry.stamp().region_version()) {
                    continue;
                }
            }
            let live = !entry.is_removed();
            if entry.is_tombstone() {
                owner.cache_perf_stats().inc_tombstone_count(-1);
            }
            self.remove_entry(&key, &slot, &mut entry);
            if live {
                cleared += 1;
            }
        }
        if rvv.is_none() {
            self.tombstones.lock().clear();
        }
        owner.cache_perf_stats().inc_clears();
        debug!(region = owner.region_path(), cleared, "entry map cleared");
        cleared
    }

    // ---- tombstone collection ----

    /// Collect tombstones older than the configured timeout, at most one
    /// batch per call. Returns the number collected.
    pub fn expire_tombstones(&self, owner: &dyn RegionOwner<K, V>, now_ms: i64) -> usize {
        let records = self.tombstones.lock().take_expired(
            now_ms,
            self.tombstone_config.timeout_ms,
            self.tombstone_config.expired_batch_limit,
        );
        let collected = records
            .iter()
            .filter(|record| self.collect_tombstone(owner, record))
            .count();
        if collected > 0 {
            debug!(region = owner.region_path(), collected, "expired tombstones collected");
        }
        collected
    }

    /// Collect tombstones whose versions `gc_vector` allows collecting.
    pub fn gc_tombstones(&self, owner: &dyn RegionOwner<K, V>, gc_vector: &RegionVersionVector) -> usize {
        let records = self.tombstones.lock().take_collectable(gc_vector);
        let collected = records
            .iter()
            .filter(|record| self.collect_tombstone(owner, record))
            .count();
        if collected > 0 {
            debug!(region = owner.region_path(), collected, "tombstones garbage collected");
        }
        collected
    }

    fn collect_tombstone(&self, owner: &dyn RegionOwner<K, V>, record: &TombstoneRecord<K>) -> bool {
        let Some(slot) = self.slot(&record.key) else {
            return false;
        };
        let mut entry = slot.lock();
        if !entry.is_tombstone() || !record.matches(entry.stamp()) {
            return false;
        }
        self.remove_entry(&record.key, &slot, &mut entry);
        let stats = owner.cache_perf_stats();
        stats.inc_tombstone_count(-1);
        stats.inc_tombstone_gc_count();
        true
    }

    // ---- internals ----

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn slot(&self, key: &K) -> Option<Slot<K, V>> {
        self.slots.read().get(key).cloned()
    }

    fn snapshot(&self) -> Vec<(K, Slot<K, V>)> {
        self.slots
            .read()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect()
    }

    fn lock_existing(&self, owner: &dyn RegionOwner<K, V>, key: &K) -> Option<(Slot<K, V>, EntryGuard<K, V>)> {
        loop {
            let slot = self.slot(key)?;
            let entry = slot.lock_arc();
            if entry.token().is_removed_phase2() {
                drop(entry);
                self.detach(key, &slot);
                owner.cache_perf_stats().inc_retries();
                continue;
            }
            return Some((slot, entry));
        }
    }

    fn lock_or_create(&self, owner: &dyn RegionOwner<K, V>, key: &K) -> (Slot<K, V>, EntryGuard<K, V>, bool) {
        loop {
            let (slot, created) = {
                let mut slots = self.slots.write();
                match slots.get(key) {
                    Some(slot) => (slot.clone(), false),
                    None => {
                        let placeholder = RegionEntry::new(
                            key.clone(),
                            Token::RemovedPhase1,
                            self.region,
                            self.tick(),
                        );
                        let slot = Arc::new(Mutex::new(placeholder));
                        slots.insert(key.clone(), slot.clone());
                        (slot, true)
                    }
                }
            };
            let entry = slot.lock_arc();
            if entry.token().is_removed_phase2() {
                drop(entry);
                self.detach(key, &slot);
                owner.cache_perf_stats().inc_retries();
                continue;
            }
            return (slot, entry, created);
        }
    }

    /// Detach `slot` if it is still the slot installed for `key`.
    fn detach(&self, key: &K, slot: &Slot<K, V>) {
        let mut slots = self.slots.write();
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }

    fn remove_entry(&self, key: &K, slot: &Slot<K, V>, entry: &mut RegionEntry<K, V>) {
        let tick = self.tick();
        entry.set_token(Token::RemovedPhase2, tick);
        self.detach(key, slot);
    }

    fn make_tombstone(
        &self,
        owner: &dyn RegionOwner<K, V>,
        key: &K,
        entry: &mut RegionEntry<K, V>,
        event: &EntryEvent<K, V>,
    ) {
        let tick = self.tick();
        let old = entry.set_token(Token::Tombstone, tick);
        entry.apply_tag(event.version_tag());
        self.record_version(owner, event.version_tag());
        if !matches!(old, Token::Tombstone) {
            owner.cache_perf_stats().inc_tombstone_count(1);
        }
        self.tombstones.lock().push(TombstoneRecord::new(
            key.clone(),
            entry.stamp(),
            Utc::now().timestamp_millis(),
        ));
        debug!(region = owner.region_path(), key = ?key, stamp = ?entry.stamp(), "tombstone created");
    }

    fn check_version(
        &self,
        owner: &dyn RegionOwner<K, V>,
        entry: &RegionEntry<K, V>,
        event: &EntryEvent<K, V>,
    ) -> Result<()> {
        if !owner.concurrency_checks_enabled() {
            return Ok(());
        }
        let Some(tag) = event.version_tag() else {
            return Ok(());
        };
        let outcome = if entry.stamp().is_versioned() {
            check_for_conflict(entry.stamp(), tag)
        } else if entry.is_removed() {
            match owner.version_vector() {
                Some(rvv) => check_absent_key(&rvv.read(), tag),
                None => ConflictOutcome::Apply,
            }
        } else {
            ConflictOutcome::Apply
        };
        if outcome.should_apply() {
            return Ok(());
        }
        owner.cache_perf_stats().inc_conflicts();
        Err(EntryError::ConcurrentCacheModification(format!(
            "{:?} for key {:?} in {} with tag {}",
            outcome,
            event.key(),
            owner.region_path(),
            tag
        )))
    }

    fn assign_local_version(&self, owner: &dyn RegionOwner<K, V>, entry: &RegionEntry<K, V>, event: &mut EntryEvent<K, V>) {
        if owner.concurrency_checks_enabled() && !event.is_origin_remote() && event.version_tag().is_none() {
            owner.generate_version_tag(event, entry.stamp());
        }
    }

    fn record_version(&self, owner: &dyn RegionOwner<K, V>, tag: Option<&VersionTag>) {
        let Some(tag) = tag.filter(|t| t.region_version() != 0) else {
            return;
        };
        if let Some(rvv) = owner.version_vector() {
            rvv.write().record_version(tag.member(), tag.region_version());
        }
    }

    fn finish_destroy(
        &self,
        owner: &dyn RegionOwner<K, V>,
        event: &EntryEvent<K, V>,
        entry: EntryGuard<K, V>,
        config: &OperationConfig,
        options: &DestroyOptions<V>,
    ) -> bool {
        owner.basic_destroy_part2(
            Some(&*entry),
            event,
            config.in_token_mode,
            false,
            options.during_ri,
            config.invoke_callbacks,
        );
        let released: RegionEntry<K, V> = (*entry).clone();
        drop(entry);
        owner.basic_destroy_part3(
            Some(&released),
            event,
            config.in_token_mode,
            options.during_ri,
            config.invoke_callbacks,
            options.expected_old_value.as_ref(),
        );
        owner.cache_perf_stats().inc_destroys();
        true
    }
}

impl<K, V> Default for EntryMap<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + PartialEq + Debug + Send + Sync,
{
    fn default() -> Self {
        Self::new(TombstoneConfig::default())
    }
}

fn stale_to_false(err: EntryError) -> Result<bool> {
    match err {
        EntryError::ConcurrentCacheModification(reason) => {
            debug!(%reason, "operation lost to a concurrent modification");
            Ok(false)
        }
        other => Err(other),
    }
}
