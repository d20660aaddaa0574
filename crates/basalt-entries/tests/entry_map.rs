//! Integration tests for the entry map.
//!
//! These tests verify:
//! - Invalidate of absent, invalid and force-created entries
//! - Destroy in every combination of token mode, concurrency checks,
//!   version tags, origin and eviction
//! - Transactional apply never overwrites removed markers
//! - Versioned conflict resolution, tombstone collection and clear

mod support;

use basalt_entries::{
    DestroyOptions, EntryError, EntryEvent, EntryMap, EvictableEntryMap, LruEntryController,
    LruEntryMap, OperationConfig, PutOptions, Token, TokenKind,
};
use basalt_versions::{RegionVersionVector, VersionTag};
use std::sync::Arc;
use std::thread;
use support::{member, DestroyPart2, DestroyPart3, FakeOwner, Key, Value};

const KEY: &str = "key";

fn key() -> Key {
    KEY.to_string()
}

fn new_map() -> EntryMap<Key, Value> {
    EntryMap::default()
}

fn force_config() -> OperationConfig {
    OperationConfig::builder().force_invalidate_event(true).build()
}

fn token_mode() -> OperationConfig {
    OperationConfig::builder().in_token_mode(true).build()
}

fn add_entry(map: &EntryMap<Key, Value>, value: &str) {
    map.install_token(key(), Token::Valid(value.to_string()), None);
}

fn destroy(
    map: &EntryMap<Key, Value>,
    owner: &FakeOwner,
    event: &mut EntryEvent<Key, Value>,
    config: &OperationConfig,
    options: &DestroyOptions<Value>,
) -> Result<bool, EntryError> {
    map.destroy(owner, event, config, options)
}

fn assert_destroy_notified_once(owner: &FakeOwner, in_token_mode: bool) {
    assert_eq!(
        owner.destroy_part2_calls(),
        vec![DestroyPart2 {
            in_token_mode,
            conflict_with_clear: false,
            during_ri: false,
            invoke_callbacks: true,
        }]
    );
    assert_eq!(
        owner.destroy_part3_calls(),
        vec![DestroyPart3 {
            in_token_mode,
            during_ri: false,
            invoke_callbacks: true,
            expected_old_value: None,
        }]
    );
    assert_eq!(*owner.call_order.lock(), vec!["part2", "part3"]);
}

fn assert_destroy_not_notified(owner: &FakeOwner) {
    assert!(owner.destroy_part2_calls().is_empty());
    assert!(owner.destroy_part3_calls().is_empty());
}

// ---- invalidate ----

#[test]
fn test_invalidate_of_absent_key_fails_with_entry_not_found() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    let mut event = EntryEvent::invalidate(key());

    let err = map
        .invalidate(&owner, &mut event, false, false, &OperationConfig::default())
        .unwrap_err();
    assert!(matches!(err, EntryError::EntryNotFound { .. }));
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 0);
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 0);
}

#[test]
fn test_invalidate_of_absent_key_with_force_still_notifies_callbacks_once() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    let mut event = EntryEvent::invalidate(key());

    let err = map
        .invalidate(&owner, &mut event, false, false, &force_config())
        .unwrap_err();
    assert!(matches!(err, EntryError::EntryNotFound { .. }));
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 0);
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 1);
}

#[test]
fn test_invalidate_of_absent_key_before_initialization_with_force_notifies_callbacks_once() {
    let map = new_map();
    let owner = FakeOwner::new();
    let mut event = EntryEvent::invalidate(key());

    let err = map
        .invalidate(&owner, &mut event, false, false, &force_config())
        .unwrap_err();
    assert!(matches!(err, EntryError::EntryNotFound { .. }));
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 0);
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 1);
}

#[test]
fn test_invalidate_of_already_invalid_entry_returns_false() {
    let map = new_map();
    let owner = FakeOwner::new();
    let mut event = EntryEvent::invalidate(key());

    // Before initialization the key is recorded as invalid.
    let err = map
        .invalidate(&owner, &mut event, false, false, &OperationConfig::default())
        .unwrap_err();
    assert!(matches!(err, EntryError::EntryNotFound { .. }));
    assert_eq!(map.token(&key()), Some(TokenKind::Invalid));

    owner.set_initialized(true);
    assert!(!map
        .invalidate(&owner, &mut event, false, false, &OperationConfig::default())
        .unwrap());
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 0);
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 0);
}

#[test]
fn test_invalidate_of_already_invalid_entry_with_force_notifies_callbacks() {
    let map = new_map();
    let owner = FakeOwner::new();
    let mut event = EntryEvent::invalidate(key());

    assert!(map
        .invalidate(&owner, &mut event, false, false, &force_config())
        .is_err());
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 1);
    owner.set_initialized(true);
    assert!(!map
        .invalidate(&owner, &mut event, false, false, &force_config())
        .unwrap());
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 0);
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 1);
}

#[test]
fn test_invalidate_force_new_entry_creates_invalid_entry_once() {
    let map = new_map();
    let owner = FakeOwner::new();
    let mut event = EntryEvent::invalidate(key());

    assert!(map
        .invalidate(&owner, &mut event, true, false, &OperationConfig::default())
        .unwrap());
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 1);

    owner.set_initialized(true);
    assert!(!map
        .invalidate(&owner, &mut event, true, false, &OperationConfig::default())
        .unwrap());
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 1);
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 0);
}

#[test]
fn test_invalidate_force_new_entry_with_force_notifies_on_second_call() {
    let map = new_map();
    let owner = FakeOwner::new();
    let mut event = EntryEvent::invalidate(key());

    assert!(map
        .invalidate(&owner, &mut event, true, false, &force_config())
        .unwrap());
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 1);
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 0);

    owner.set_initialized(true);
    assert!(!map
        .invalidate(&owner, &mut event, true, false, &force_config())
        .unwrap());
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 1);
    assert_eq!(FakeOwner::count(&owner.invalidate_callbacks), 1);
}

#[test]
fn test_invalidate_of_valid_entry_keeps_key_without_value() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    add_entry(&map, "value");
    let mut event = EntryEvent::invalidate(key());

    assert!(map
        .invalidate(&owner, &mut event, false, false, &OperationConfig::default())
        .unwrap());
    assert_eq!(event.old_value(), Some(&"value".to_string()));
    assert!(map.contains_key(&key()));
    assert_eq!(map.get(&key()), None);
    assert_eq!(FakeOwner::count(&owner.invalidate_part2), 1);
}

// ---- destroy ----

#[test]
fn test_destroy_with_empty_region_fails() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    let mut event = EntryEvent::destroy(key());
    let err = destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default())
        .unwrap_err();
    assert!(matches!(err, EntryError::EntryNotFound { .. }));
    assert_destroy_not_notified(&owner);
}

#[test]
fn test_destroy_with_empty_region_in_token_mode_adds_a_token() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    let mut event = EntryEvent::destroy(key());
    assert!(destroy(&map, &owner, &mut event, &token_mode(), &DestroyOptions::default()).unwrap());
    assert_eq!(map.token(&key()), Some(TokenKind::Destroyed));
    assert!(!map.contains_key(&key()));
    assert_destroy_notified_once(&owner, true);
}

#[test]
fn test_destroy_of_existing_entry_in_token_mode_adds_a_token() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    add_entry(&map, "value");
    let mut event = EntryEvent::destroy(key());
    assert!(destroy(&map, &owner, &mut event, &token_mode(), &DestroyOptions::default()).unwrap());
    assert_eq!(map.token(&key()), Some(TokenKind::Destroyed));
    assert_eq!(event.old_value(), Some(&"value".to_string()));
    assert_destroy_notified_once(&owner, true);
}

#[test]
fn test_destroy_of_existing_entry_removes_it_and_notifies() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    add_entry(&map, "value");
    let mut event = EntryEvent::destroy(key());
    assert!(destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default()).unwrap());
    assert!(!map.contains_slot(&key()));
    assert_destroy_notified_once(&owner, false);
}

#[test]
fn test_destroy_of_existing_entry_with_concurrency_checks_and_no_tag_removes_it() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    add_entry(&map, "value");
    let mut event = EntryEvent::destroy(key());
    assert!(destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default()).unwrap());
    assert!(!map.contains_slot(&key()));
    assert_eq!(map.tombstone_count(), 0);
    assert_destroy_notified_once(&owner, false);
}

#[test]
fn test_destroy_of_existing_entry_with_concurrency_checks_adds_tombstone() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    add_entry(&map, "value");
    let tag = VersionTag::new(member(2), 1, 7);
    let mut event = EntryEvent::destroy(key()).with_version_tag(tag).from_remote();
    assert!(destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default()).unwrap());

    assert!(map.contains_slot(&key()));
    assert_eq!(map.token(&key()), Some(TokenKind::Tombstone));
    assert!(owner.rvv().unwrap().read().contains(&member(2), 7));
    assert_eq!(owner.stats().snapshot().tombstones, 1);
    assert_destroy_notified_once(&owner, false);

    // The key is now logically absent.
    let mut again = EntryEvent::destroy(key());
    let err = destroy(&map, &owner, &mut again, &OperationConfig::default(), &DestroyOptions::default())
        .unwrap_err();
    assert!(matches!(err, EntryError::EntryNotFound { .. }));
}

#[test]
fn test_evict_destroy_of_existing_entry_with_concurrency_checks_adds_tombstone() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    add_entry(&map, "value");
    let tag = VersionTag::new(member(2), 1, 3);
    let mut event = EntryEvent::destroy(key()).with_version_tag(tag).from_remote();
    assert!(destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::eviction()).unwrap());
    assert_eq!(map.token(&key()), Some(TokenKind::Tombstone));
    assert_destroy_notified_once(&owner, false);
}

#[test]
fn test_destroy_with_empty_region_with_concurrency_checks_fails() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let mut event = EntryEvent::destroy(key());
    let err = destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default())
        .unwrap_err();
    assert!(matches!(err, EntryError::EntryNotFound { .. }));
    assert!(!map.contains_slot(&key()));
}

#[test]
fn test_evict_destroy_with_empty_region_with_concurrency_checks_leaves_removed_phase1() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let mut event = EntryEvent::destroy(key());
    assert!(!destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::eviction()).unwrap());
    assert_destroy_not_notified(&owner);
    // The placeholder is kept even though nothing was destroyed.
    assert!(map.contains_slot(&key()));
    assert_eq!(map.token(&key()), Some(TokenKind::RemovedPhase1));
    assert!(!map.contains_key(&key()));
}

#[test]
fn test_evict_destroy_with_empty_region_does_nothing() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    let mut event = EntryEvent::destroy(key());
    assert!(!destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::eviction()).unwrap());
    assert_destroy_not_notified(&owner);
    assert!(!map.contains_slot(&key()));
}

#[test]
fn test_remote_destroy_with_empty_region_with_concurrency_checks_adds_tombstone() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let tag = VersionTag::new(member(2), 1, 1);
    let mut event = EntryEvent::destroy(key()).with_version_tag(tag).from_remote();
    assert!(destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default()).unwrap());
    assert_eq!(map.token(&key()), Some(TokenKind::Tombstone));
    assert_destroy_notified_once(&owner, false);
}

#[test]
fn test_remote_destroy_with_empty_region_and_no_tag_leaves_removed_phase1() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let mut event = EntryEvent::destroy(key()).from_remote();
    assert!(destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default()).unwrap());
    assert!(map.contains_slot(&key()));
    assert_eq!(map.token(&key()), Some(TokenKind::RemovedPhase1));
    assert_destroy_notified_once(&owner, false);
}

#[test]
fn test_destroy_with_mismatched_expected_old_value_is_skipped() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    add_entry(&map, "value");
    let mut event = EntryEvent::destroy(key());
    let options = DestroyOptions::expecting("other".to_string());
    assert!(!destroy(&map, &owner, &mut event, &OperationConfig::default(), &options).unwrap());
    assert_eq!(map.get(&key()), Some("value".to_string()));
    assert_destroy_not_notified(&owner);
}

#[test]
fn test_local_destroy_with_generated_tag_adds_tombstone() {
    let map = new_map();
    let owner = FakeOwner::versioned_generating();
    add_entry(&map, "value");
    let mut event = EntryEvent::destroy(key());
    assert!(destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default()).unwrap());
    assert_eq!(map.token(&key()), Some(TokenKind::Tombstone));
    assert_eq!(event.version_tag().map(|t| t.region_version()), Some(1));
    let entry = map.entry(&key()).unwrap();
    assert_eq!(entry.stamp().member(), Some(&member(1)));
}

// ---- transactions ----

#[test]
fn test_tx_apply_invalidate_does_not_change_removed_tokens() {
    let owner = FakeOwner::versioned();
    for token in [
        Token::RemovedPhase2,
        Token::RemovedPhase1,
        Token::Destroyed,
        Token::Tombstone,
    ] {
        let map = new_map();
        let kind = token.kind();
        map.install_token(key(), token, None);
        let mut event = EntryEvent::invalidate(key());
        assert!(!map.tx_apply_invalidate(&owner, &mut event).unwrap());
        assert_eq!(map.token(&key()), Some(kind), "token {:?} changed", kind);
    }
    assert_eq!(FakeOwner::count(&owner.tx_part2), 0);
}

#[test]
fn test_tx_apply_invalidate_of_valid_entry() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    add_entry(&map, "value");
    let mut event = EntryEvent::invalidate(key());
    assert!(map.tx_apply_invalidate(&owner, &mut event).unwrap());
    assert_eq!(map.token(&key()), Some(TokenKind::Invalid));
    assert_eq!(FakeOwner::count(&owner.tx_part2), 1);
}

#[test]
fn test_tx_apply_destroy_does_not_change_removed_tokens() {
    let owner = FakeOwner::versioned();
    for token in [Token::RemovedPhase1, Token::Destroyed, Token::Tombstone] {
        let map = new_map();
        let kind = token.kind();
        map.install_token(key(), token, None);
        let mut event = EntryEvent::destroy(key());
        assert!(!map.tx_apply_destroy(&owner, &mut event, false).unwrap());
        assert_eq!(map.token(&key()), Some(kind));
    }
}

#[test]
fn test_tx_apply_put_then_destroy() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    let mut put = EntryEvent::put(key(), "v1".to_string());
    assert!(map.tx_apply_put(&owner, &mut put).unwrap());
    assert_eq!(map.get(&key()), Some("v1".to_string()));

    let mut destroy = EntryEvent::destroy(key());
    assert!(map.tx_apply_destroy(&owner, &mut destroy, false).unwrap());
    assert!(!map.contains_slot(&key()));
    assert_eq!(FakeOwner::count(&owner.tx_part2), 2);
}

// ---- put ----

#[test]
fn test_put_conditions() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    let config = OperationConfig::default();

    let mut replace = EntryEvent::put(key(), "x".to_string());
    assert!(!map.put(&owner, &mut replace, &PutOptions::if_old(), &config).unwrap());
    assert!(!map.contains_slot(&key()));

    let mut create = EntryEvent::put(key(), "a".to_string());
    assert!(map.put(&owner, &mut create, &PutOptions::if_new(), &config).unwrap());
    let mut again = EntryEvent::put(key(), "b".to_string());
    assert!(!map.put(&owner, &mut again, &PutOptions::if_new(), &config).unwrap());

    let mut wrong = EntryEvent::put(key(), "c".to_string());
    assert!(!map
        .put(&owner, &mut wrong, &PutOptions::replacing("zzz".to_string()), &config)
        .unwrap());
    let mut right = EntryEvent::put(key(), "c".to_string());
    assert!(map
        .put(&owner, &mut right, &PutOptions::replacing("a".to_string()), &config)
        .unwrap());
    assert_eq!(right.old_value(), Some(&"a".to_string()));
    assert_eq!(map.get(&key()), Some("c".to_string()));
    assert_eq!(FakeOwner::count(&owner.put_part2), 2);
}

#[test]
fn test_put_without_value_is_rejected() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    let mut event = EntryEvent::invalidate(key());
    let err = map
        .put(&owner, &mut event, &PutOptions::default(), &OperationConfig::default())
        .unwrap_err();
    assert!(matches!(err, EntryError::InvalidToken { .. }));
}

#[test]
fn test_put_during_initial_image_keeps_destroyed_token() {
    let map = new_map();
    let owner = FakeOwner::initialized();
    map.install_token(key(), Token::Destroyed, None);
    let config = OperationConfig::builder().during_initial_image(true).build();
    let mut event = EntryEvent::put(key(), "image".to_string());
    assert!(!map.put(&owner, &mut event, &PutOptions::default(), &config).unwrap());
    assert_eq!(map.token(&key()), Some(TokenKind::Destroyed));
}

#[test]
fn test_stale_remote_put_is_ignored() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let config = OperationConfig::default();

    let mut newer = EntryEvent::put(key(), "new".to_string())
        .with_version_tag(VersionTag::new(member(2), 2, 2))
        .from_remote();
    assert!(map.put(&owner, &mut newer, &PutOptions::default(), &config).unwrap());

    let mut older = EntryEvent::put(key(), "old".to_string())
        .with_version_tag(VersionTag::new(member(3), 1, 1))
        .from_remote();
    assert!(!map.put(&owner, &mut older, &PutOptions::default(), &config).unwrap());
    assert_eq!(map.get(&key()), Some("new".to_string()));
    assert_eq!(owner.stats().snapshot().conflicts, 1);
}

#[test]
fn test_tombstone_rejects_older_put_and_yields_to_newer() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let config = OperationConfig::default();

    let mut destroy_event = EntryEvent::destroy(key())
        .with_version_tag(VersionTag::new(member(2), 5, 1))
        .from_remote();
    assert!(destroy(&map, &owner, &mut destroy_event, &config, &DestroyOptions::default()).unwrap());

    let mut late = EntryEvent::put(key(), "late".to_string())
        .with_version_tag(VersionTag::new(member(3), 4, 1))
        .from_remote();
    assert!(!map.put(&owner, &mut late, &PutOptions::default(), &config).unwrap());
    assert_eq!(map.token(&key()), Some(TokenKind::Tombstone));

    let mut fresh = EntryEvent::put(key(), "fresh".to_string())
        .with_version_tag(VersionTag::new(member(3), 6, 2))
        .from_remote();
    assert!(map.put(&owner, &mut fresh, &PutOptions::default(), &config).unwrap());
    assert_eq!(map.get(&key()), Some("fresh".to_string()));
    assert_eq!(owner.stats().snapshot().tombstones, 0);
}

// ---- tombstone collection and clear ----

#[test]
fn test_expired_tombstones_are_collected() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    add_entry(&map, "value");
    let mut event = EntryEvent::destroy(key())
        .with_version_tag(VersionTag::new(member(2), 1, 1))
        .from_remote();
    destroy(&map, &owner, &mut event, &OperationConfig::default(), &DestroyOptions::default()).unwrap();

    let created = map.entry(&key()).unwrap().stamp().timestamp();
    assert_eq!(map.expire_tombstones(&owner, i64::MIN / 2), 0);
    let later = chrono::Utc::now().timestamp_millis() + map.tombstone_config().timeout_ms as i64;
    assert!(later > created);
    assert_eq!(map.expire_tombstones(&owner, later), 1);
    assert!(!map.contains_slot(&key()));
    assert_eq!(owner.stats().snapshot().tombstone_gcs, 1);
}

#[test]
fn test_resurrected_key_is_not_collected_by_old_record() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let config = OperationConfig::default();
    let mut event = EntryEvent::destroy(key())
        .with_version_tag(VersionTag::new(member(2), 1, 1))
        .from_remote();
    destroy(&map, &owner, &mut event, &config, &DestroyOptions::default()).unwrap();
    let mut put = EntryEvent::put(key(), "back".to_string())
        .with_version_tag(VersionTag::new(member(2), 2, 2))
        .from_remote();
    map.put(&owner, &mut put, &PutOptions::default(), &config).unwrap();

    let mut gc = RegionVersionVector::new(member(1));
    gc.record_gc_version(&member(2), 10);
    assert_eq!(map.gc_tombstones(&owner, &gc), 0);
    assert_eq!(map.get(&key()), Some("back".to_string()));
}

#[test]
fn test_gc_vector_collects_covered_tombstones() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let config = OperationConfig::default();
    for (k, rv) in [("a", 1), ("b", 5)] {
        let mut event = EntryEvent::destroy(k.to_string())
            .with_version_tag(VersionTag::new(member(2), 1, rv))
            .from_remote();
        destroy(&map, &owner, &mut event, &config, &DestroyOptions::default()).unwrap();
    }
    let mut gc = RegionVersionVector::new(member(1));
    gc.record_gc_version(&member(2), 3);
    assert_eq!(map.gc_tombstones(&owner, &gc), 1);
    assert!(!map.contains_slot(&"a".to_string()));
    assert_eq!(map.token(&"b".to_string()), Some(TokenKind::Tombstone));
}

#[test]
fn test_clear_with_version_vector_keeps_newer_entries() {
    let map = new_map();
    let owner = FakeOwner::versioned();
    let config = OperationConfig::default();
    for (k, rv) in [("old", 1), ("new", 9)] {
        let mut event = EntryEvent::put(k.to_string(), k.to_string())
            .with_version_tag(VersionTag::new(member(2), 1, rv))
            .from_remote();
        map.put(&owner, &mut event, &PutOptions::default(), &config).unwrap();
    }
    let mut snapshot = RegionVersionVector::new(member(1));
    snapshot.record_version(&member(2), 1);

    assert_eq!(map.clear(&owner, Some(&snapshot)), 1);
    assert!(!map.contains_key(&"old".to_string()));
    assert!(map.contains_key(&"new".to_string()));

    assert_eq!(map.clear(&owner, None), 1);
    assert!(map.is_empty());
}

// ---- eviction ----

#[test]
fn test_lru_map_evicts_least_recently_modified() {
    let lru = LruEntryMap::new(new_map(), Box::new(LruEntryController::new(2)));
    let owner = FakeOwner::initialized();
    let config = OperationConfig::default();
    for k in ["a", "b", "c"] {
        let mut event = EntryEvent::put(k.to_string(), k.to_string());
        lru.put(&owner, &mut event, &PutOptions::default(), &config).unwrap();
    }
    assert_eq!(lru.entries().len(), 2);
    assert!(!lru.entries().contains_key(&"a".to_string()));
    assert_eq!(lru.eviction_controller().evictions(), 1);
    assert_eq!(owner.stats().snapshot().evictions, 1);
}

// ---- concurrency ----

#[test]
fn test_concurrent_operations_on_distinct_keys() {
    let map = Arc::new(new_map());
    let owner = Arc::new(FakeOwner::initialized());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let map = map.clone();
            let owner = owner.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    let k = format!("{}-{}", t, i);
                    let mut put = EntryEvent::put(k.clone(), "v".to_string());
                    map.put(owner.as_ref(), &mut put, &PutOptions::default(), &OperationConfig::default())
                        .unwrap();
                    if i % 2 == 0 {
                        let mut d = EntryEvent::destroy(k);
                        map.destroy(owner.as_ref(), &mut d, &OperationConfig::default(), &DestroyOptions::default())
                            .unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(map.len(), 8 * 50);
}

#[test]
fn test_concurrent_puts_on_one_key_serialize() {
    let map = Arc::new(new_map());
    let owner = Arc::new(FakeOwner::initialized());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let map = map.clone();
            let owner = owner.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let mut put = EntryEvent::put(key(), format!("{}-{}", t, i));
                    map.put(owner.as_ref(), &mut put, &PutOptions::default(), &OperationConfig::default())
                        .unwrap();
                    if i % 10 == 0 {
                        let mut d = EntryEvent::destroy(key());
                        let _ = map.destroy(
                            owner.as_ref(),
                            &mut d,
                            &OperationConfig::default(),
                            &DestroyOptions::default(),
                        );
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(map.token(&key()).map(|k| !k.is_removed()).unwrap_or(true));
    assert_eq!(FakeOwner::count(&owner.put_part2), 800);
}
