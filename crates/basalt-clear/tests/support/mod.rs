//! Test doubles for the collaborators of a clear coordinator.

#![allow(dead_code)]

use basalt_buckets::{BucketDataStore, ClearableBucket};
use basalt_clear::{
    ClearError, ClearMessage, ClearReply, ClearableRegion, DistributionChannel, ListenerEvent,
    PersistedNodeSet, RegionEvent, ReplyCollector, Result, RetryTimer,
};
use basalt_membership::{
    DistributedLockService, MemberIdentity, MembershipError, MembershipListener,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn member(port: u16) -> MemberIdentity {
    MemberIdentity::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A bucket whose primary state is scripted.
pub struct FakeBucket {
    id: u32,
    primary_answers: Mutex<VecDeque<bool>>,
    is_primary: AtomicBool,
    size: AtomicUsize,
    pub primary_polls: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub lock_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
    pub locked_by: Mutex<Option<MemberIdentity>>,
    on_clear: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl FakeBucket {
    pub fn primary(id: u32) -> Arc<Self> {
        Arc::new(Self::new(id, true, &[true]))
    }

    pub fn secondary(id: u32) -> Arc<Self> {
        Arc::new(Self::new(id, false, &[true]))
    }

    /// A bucket whose `has_primary` answers follow `answers`, repeating the
    /// last one.
    pub fn with_primary_answers(id: u32, answers: &[bool]) -> Arc<Self> {
        Arc::new(Self::new(id, true, answers))
    }

    fn new(id: u32, is_primary: bool, answers: &[bool]) -> Self {
        FakeBucket {
            id,
            primary_answers: Mutex::new(answers.iter().copied().collect()),
            is_primary: AtomicBool::new(is_primary),
            size: AtomicUsize::new(3),
            primary_polls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            lock_calls: AtomicUsize::new(0),
            release_calls: AtomicUsize::new(0),
            locked_by: Mutex::new(None),
            on_clear: Mutex::new(None),
        }
    }

    /// Run `hook` during the next clear of this bucket.
    pub fn on_next_clear(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_clear.lock() = Some(Box::new(hook));
    }

    pub fn clears(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

impl ClearableBucket for FakeBucket {
    fn bucket_id(&self) -> u32 {
        self.id
    }

    fn has_primary(&self) -> bool {
        self.primary_polls.fetch_add(1, Ordering::SeqCst);
        let mut answers = self.primary_answers.lock();
        if answers.len() > 1 {
            answers.pop_front().unwrap_or(false)
        } else {
            answers.front().copied().unwrap_or(false)
        }
    }

    fn is_primary(&self) -> bool {
        self.is_primary.load(Ordering::SeqCst)
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    fn clear(&self) -> usize {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.on_clear.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        self.size.swap(0, Ordering::SeqCst)
    }

    fn lock_locally_for_clear(&self, requester: &MemberIdentity) {
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        *self.locked_by.lock() = Some(requester.clone());
    }

    fn release_lock_locally_for_clear(&self) {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        *self.locked_by.lock() = None;
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub buckets: Vec<Arc<FakeBucket>>,
    pub creation_locks: AtomicUsize,
    pub creation_unlocks: AtomicUsize,
}

impl FakeStore {
    pub fn new(buckets: Vec<Arc<FakeBucket>>) -> Arc<Self> {
        Arc::new(FakeStore {
            buckets,
            ..FakeStore::default()
        })
    }
}

impl BucketDataStore for FakeStore {
    fn all_local_buckets(&self) -> Vec<Arc<dyn ClearableBucket>> {
        self.buckets
            .iter()
            .map(|b| b.clone() as Arc<dyn ClearableBucket>)
            .collect()
    }

    fn all_local_primary_buckets(&self) -> Vec<Arc<dyn ClearableBucket>> {
        self.buckets
            .iter()
            .filter(|b| b.is_primary())
            .map(|b| b.clone() as Arc<dyn ClearableBucket>)
            .collect()
    }

    fn lock_bucket_creation_for_region_clear(&self) {
        self.creation_locks.fetch_add(1, Ordering::SeqCst);
    }

    fn unlock_bucket_creation_for_region_clear(&self) {
        self.creation_unlocks.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records lock requests and grants them unless told to fail.
#[derive(Default)]
pub struct RecordingLockService {
    pub locks: Mutex<Vec<(String, Option<Duration>, Option<Duration>)>>,
    pub unlocks: Mutex<Vec<String>>,
    pub fail_with: Mutex<Option<MembershipError>>,
}

impl DistributedLockService for RecordingLockService {
    fn lock(&self, name: &str, wait: Option<Duration>, lease: Option<Duration>) -> basalt_membership::Result<()> {
        self.locks.lock().push((name.to_string(), wait, lease));
        match self.fail_with.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn unlock(&self, name: &str) -> basalt_membership::Result<()> {
        self.unlocks.lock().push(name.to_string());
        Ok(())
    }
}

pub struct FakeRegion {
    pub name: String,
    pub total_buckets: u32,
    pub store: Option<Arc<FakeStore>>,
    pub lock_service: Arc<RecordingLockService>,
    pub nodes: Mutex<PersistedNodeSet>,
    pub listener: AtomicBool,
    pub clients: Mutex<BTreeSet<String>>,
    pub dispatched: Mutex<Vec<(ListenerEvent, RegionEvent)>>,
    pub notified: Mutex<Vec<RegionEvent>>,
    pub writer_veto: Mutex<Option<String>>,
    pub log: CallLog,
}

impl FakeRegion {
    pub fn new(name: &str, total_buckets: u32, store: Option<Arc<FakeStore>>, log: CallLog) -> Self {
        FakeRegion {
            name: name.to_string(),
            total_buckets,
            store,
            lock_service: Arc::new(RecordingLockService::default()),
            nodes: Mutex::new(PersistedNodeSet::new()),
            listener: AtomicBool::new(false),
            clients: Mutex::new(BTreeSet::new()),
            dispatched: Mutex::new(Vec::new()),
            notified: Mutex::new(Vec::new()),
            writer_veto: Mutex::new(None),
            log,
        }
    }

    pub fn with_nodes(self, nodes: &[MemberIdentity]) -> Self {
        *self.nodes.lock() = nodes.iter().cloned().collect();
        self
    }

    pub fn with_listener(self) -> Self {
        self.listener.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_client(self, client: &str) -> Self {
        self.clients.lock().insert(client.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl ClearableRegion for FakeRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn total_bucket_count(&self) -> u32 {
        self.total_buckets
    }

    fn data_store(&self) -> Option<Arc<dyn BucketDataStore>> {
        self.store.clone().map(|s| s as Arc<dyn BucketDataStore>)
    }

    fn lock_service(&self) -> Arc<dyn DistributedLockService> {
        self.lock_service.clone()
    }

    fn persisted_nodes(&self) -> PersistedNodeSet {
        self.nodes.lock().clone()
    }

    fn has_listener(&self) -> bool {
        self.listener.load(Ordering::SeqCst)
    }

    fn interested_clients(&self) -> BTreeSet<String> {
        self.clients.lock().clone()
    }

    fn dispatch_listener_event(&self, kind: ListenerEvent, event: &RegionEvent) {
        self.log.lock().push("listener".to_string());
        self.dispatched.lock().push((kind, event.clone()));
    }

    fn notify_bridge_clients(&self, event: &RegionEvent) {
        self.log.lock().push("clients".to_string());
        self.notified.lock().push(event.clone());
    }

    fn invoke_cache_writer(&self, _event: &RegionEvent) -> Result<()> {
        self.log.lock().push("writer".to_string());
        match self.writer_veto.lock().clone() {
            Some(reason) => Err(ClearError::CacheWriter(reason)),
            None => Ok(()),
        }
    }

    fn assign_all_primary_buckets(&self) -> Result<()> {
        self.log.lock().push("assign".to_string());
        Ok(())
    }
}

/// Decides how a recipient answers. `None` means the recipient departed.
pub type Responder = Box<dyn Fn(&ClearMessage, &MemberIdentity) -> Option<ClearReply> + Send + Sync>;

/// A channel that answers synchronously through a [`Responder`].
pub struct FakeChannel {
    local: MemberIdentity,
    members: Mutex<BTreeSet<MemberIdentity>>,
    listeners: Mutex<Vec<Arc<dyn MembershipListener>>>,
    responder: Mutex<Responder>,
    pub sent: Mutex<Vec<ClearMessage>>,
    pub recipients: Mutex<Vec<Vec<MemberIdentity>>>,
    pub cancelled: AtomicBool,
    log: CallLog,
}

impl FakeChannel {
    pub fn new(local: MemberIdentity, members: &[MemberIdentity], log: CallLog) -> Arc<Self> {
        let mut current: BTreeSet<_> = members.iter().cloned().collect();
        current.insert(local.clone());
        let acknowledge: Responder = Box::new(|message: &ClearMessage, recipient: &MemberIdentity| {
            Some(ClearReply::ok(message, recipient.clone(), Vec::new()))
        });
        Arc::new(FakeChannel {
            local,
            members: Mutex::new(current),
            listeners: Mutex::new(Vec::new()),
            responder: Mutex::new(acknowledge),
            sent: Mutex::new(Vec::new()),
            recipients: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
            log,
        })
    }

    pub fn respond_with(&self, responder: Responder) {
        *self.responder.lock() = responder;
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Remove `member` and tell every registered listener.
    pub fn depart(&self, member: &MemberIdentity) {
        self.members.lock().remove(member);
        let listeners: Vec<_> = self.listeners.lock().clone();
        for listener in listeners {
            listener.member_departed(member, true);
        }
    }

    pub fn operations(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|m| m.operation.to_string())
            .collect()
    }
}

impl DistributionChannel for FakeChannel {
    fn local_member(&self) -> &MemberIdentity {
        &self.local
    }

    fn is_current_member(&self, member: &MemberIdentity) -> bool {
        self.members.lock().contains(member)
    }

    fn add_membership_listener(&self, listener: Arc<dyn MembershipListener>) {
        self.listeners.lock().push(listener);
    }

    fn put_outgoing(&self, message: ClearMessage, recipients: &[MemberIdentity]) -> Result<Arc<ReplyCollector>> {
        self.log.lock().push(format!("send:{}", message.operation));
        let collector = Arc::new(ReplyCollector::new(recipients.iter().cloned()));
        {
            let responder = self.responder.lock();
            for recipient in recipients {
                match responder(&message, recipient) {
                    Some(reply) => collector.reply(reply),
                    None => collector.member_departed(recipient),
                }
            }
        }
        self.sent.lock().push(message);
        self.recipients.lock().push(recipients.to_vec());
        Ok(collector)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A retry timer whose `over_maximum` answers are scripted.
pub struct ScriptedRetryTimer {
    over: VecDeque<bool>,
    pub waits: usize,
}

impl ScriptedRetryTimer {
    pub fn new(over: &[bool]) -> Self {
        ScriptedRetryTimer {
            over: over.iter().copied().collect(),
            waits: 0,
        }
    }
}

impl RetryTimer for ScriptedRetryTimer {
    fn over_maximum(&self) -> bool {
        self.over.front().copied().unwrap_or(false)
    }

    fn wait_for_buckets_recovery(&mut self) {
        self.waits += 1;
        if self.over.len() > 1 {
            self.over.pop_front();
        }
    }
}
