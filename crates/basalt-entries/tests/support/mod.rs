//! In-memory region owner used by the entry map tests.

#![allow(dead_code)]

use basalt_entries::{
    CachePerfStats, DataPolicy, EntryEvent, RegionEntry, RegionOwner,
};
use basalt_membership::MemberIdentity;
use basalt_versions::{RegionVersionVector, SharedVersionVector, VersionStamp};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub type Key = String;
pub type Value = String;

pub fn member(port: u16) -> MemberIdentity {
    MemberIdentity::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// Arguments observed by `basic_destroy_part2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestroyPart2 {
    pub in_token_mode: bool,
    pub conflict_with_clear: bool,
    pub during_ri: bool,
    pub invoke_callbacks: bool,
}

/// Arguments observed by `basic_destroy_part3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestroyPart3 {
    pub in_token_mode: bool,
    pub during_ri: bool,
    pub invoke_callbacks: bool,
    pub expected_old_value: Option<Value>,
}

pub struct FakeOwner {
    initialized: AtomicBool,
    concurrency_checks: bool,
    rvv: Option<SharedVersionVector>,
    tag_generator: Option<MemberIdentity>,
    stats: CachePerfStats,
    pub invalidate_part2: AtomicUsize,
    pub invalidate_callbacks: AtomicUsize,
    pub put_part2: AtomicUsize,
    pub tx_part2: AtomicUsize,
    pub destroy_part2: Mutex<Vec<DestroyPart2>>,
    pub destroy_part3: Mutex<Vec<DestroyPart3>>,
    pub call_order: Mutex<Vec<&'static str>>,
}

impl FakeOwner {
    /// An uninitialized region without concurrency checks.
    pub fn new() -> Self {
        FakeOwner {
            initialized: AtomicBool::new(false),
            concurrency_checks: false,
            rvv: None,
            tag_generator: None,
            stats: CachePerfStats::new(),
            invalidate_part2: AtomicUsize::new(0),
            invalidate_callbacks: AtomicUsize::new(0),
            put_part2: AtomicUsize::new(0),
            tx_part2: AtomicUsize::new(0),
            destroy_part2: Mutex::new(Vec::new()),
            destroy_part3: Mutex::new(Vec::new()),
            call_order: Mutex::new(Vec::new()),
        }
    }

    pub fn initialized() -> Self {
        let owner = FakeOwner::new();
        owner.set_initialized(true);
        owner
    }

    /// An initialized region with concurrency checks and a version vector.
    pub fn versioned() -> Self {
        FakeOwner {
            concurrency_checks: true,
            rvv: Some(RegionVersionVector::new(member(1)).into_shared()),
            ..FakeOwner::initialized()
        }
    }

    /// Like [`FakeOwner::versioned`], and assigns tags to local operations.
    pub fn versioned_generating() -> Self {
        FakeOwner {
            tag_generator: Some(member(1)),
            ..FakeOwner::versioned()
        }
    }

    pub fn with_concurrency_checks(mut self, enabled: bool) -> Self {
        self.concurrency_checks = enabled;
        self
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    pub fn rvv(&self) -> Option<&SharedVersionVector> {
        self.rvv.as_ref()
    }

    pub fn stats(&self) -> &CachePerfStats {
        &self.stats
    }

    pub fn destroy_part2_calls(&self) -> Vec<DestroyPart2> {
        self.destroy_part2.lock().clone()
    }

    pub fn destroy_part3_calls(&self) -> Vec<DestroyPart3> {
        self.destroy_part3.lock().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl RegionOwner<Key, Value> for FakeOwner {
    fn region_path(&self) -> &str {
        "/test"
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn concurrency_checks_enabled(&self) -> bool {
        self.concurrency_checks
    }

    fn data_policy(&self) -> DataPolicy {
        DataPolicy::Replicate
    }

    fn version_vector(&self) -> Option<SharedVersionVector> {
        self.rvv.clone()
    }

    fn cache_perf_stats(&self) -> &CachePerfStats {
        &self.stats
    }

    fn generate_version_tag(&self, event: &mut EntryEvent<Key, Value>, stamp: &VersionStamp) {
        if let (Some(me), Some(rvv)) = (&self.tag_generator, &self.rvv) {
            let region_version = rvv.write().next_region_version();
            event.set_version_tag(Some(stamp.next_tag(me.clone(), region_version)));
        }
    }

    fn basic_invalidate_part2(
        &self,
        _entry: &RegionEntry<Key, Value>,
        _event: &EntryEvent<Key, Value>,
        _conflict_with_clear: bool,
        _invoke_callbacks: bool,
    ) {
        self.invalidate_part2.fetch_add(1, Ordering::SeqCst);
    }

    fn basic_destroy_part2(
        &self,
        _entry: Option<&RegionEntry<Key, Value>>,
        _event: &EntryEvent<Key, Value>,
        in_token_mode: bool,
        conflict_with_clear: bool,
        during_ri: bool,
        invoke_callbacks: bool,
    ) {
        self.call_order.lock().push("part2");
        self.destroy_part2.lock().push(DestroyPart2 {
            in_token_mode,
            conflict_with_clear,
            during_ri,
            invoke_callbacks,
        });
    }

    fn basic_destroy_part3(
        &self,
        _entry: Option<&RegionEntry<Key, Value>>,
        _event: &EntryEvent<Key, Value>,
        in_token_mode: bool,
        during_ri: bool,
        invoke_callbacks: bool,
        expected_old_value: Option<&Value>,
    ) {
        self.call_order.lock().push("part3");
        self.destroy_part3.lock().push(DestroyPart3 {
            in_token_mode,
            during_ri,
            invoke_callbacks,
            expected_old_value: expected_old_value.cloned(),
        });
    }

    fn invoke_invalidate_callbacks(&self, _event: &EntryEvent<Key, Value>, _invoke_callbacks: bool) {
        self.invalidate_callbacks.fetch_add(1, Ordering::SeqCst);
    }

    fn basic_put_part2(&self, _entry: &RegionEntry<Key, Value>, _event: &EntryEvent<Key, Value>, _is_create: bool) {
        self.put_part2.fetch_add(1, Ordering::SeqCst);
    }

    fn tx_apply_part2(&self, _entry: &RegionEntry<Key, Value>, _event: &EntryEvent<Key, Value>) {
        self.tx_part2.fetch_add(1, Ordering::SeqCst);
    }
}
