//! Cluster-wide clear of a partitioned region.
//!
//! Every member hosting the region runs a [`ClearCoordinator`]. The member
//! where the clear is issued drives it through [`ClearCoordinator::do_clear`]:
//!
//! 1. take the distributed clear lock so one clear runs at a time
//! 2. run the cache writer, if asked to
//! 3. when the region has listeners or interested clients, take the clear
//!    lock locally and on every other member, so notifications are ordered
//!    against concurrent operations
//! 4. make sure every bucket has a primary
//! 5. clear the local primary buckets, then have every other member clear
//!    theirs (`OP_PR_CLEAR`)
//! 6. release the locks in reverse order
//!
//! The clear succeeds only if the distinct buckets cleared across members
//! cover the whole region.
//!
//! A membership change while local buckets are being cleared restarts the
//! local pass, since primaries may have moved onto this member.

use crate::config::ClearConfig;
use crate::distribution::{ClearMessageHandler, DistributionChannel};
use crate::error::{ClearError, Result};
use crate::event::{FilterInfo, ListenerEvent, RegionEvent};
use crate::lock::ClearLock;
use crate::message::{ClearMessage, ClearReply, OperationType};
use crate::phase::ClearPhase;
use crate::region::ClearableRegion;
use crate::retry::{RetryTimeKeeper, RetryTimer};
use basalt_buckets::BucketDataStore;
use basalt_membership::{MemberIdentity, MembershipError, MembershipListener};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

/// Prefix of the distributed lock that serializes clears of one region.
pub const CLEAR_OPERATION: &str = "_clearOperation";

enum SendAttempt {
    Replied(Vec<u32>),
    Departed(Vec<MemberIdentity>),
}

/// Runs and answers distributed clears for one region on one member.
pub struct ClearCoordinator {
    region: Arc<dyn ClearableRegion>,
    channel: Arc<dyn DistributionChannel>,
    config: ClearConfig,
    clear_lock: ClearLock,
    membership_change: AtomicBool,
    phase: Mutex<ClearPhase>,
    listener: Arc<ClearMembershipListener>,
}

impl ClearCoordinator {
    /// Create a coordinator and register its membership listener with
    /// `channel`.
    pub fn new(
        region: Arc<dyn ClearableRegion>,
        channel: Arc<dyn DistributionChannel>,
        config: ClearConfig,
    ) -> Arc<Self> {
        let coordinator = Arc::new_cyclic(|me: &Weak<ClearCoordinator>| ClearCoordinator {
            region,
            channel,
            config,
            clear_lock: ClearLock::new(),
            membership_change: AtomicBool::new(false),
            phase: Mutex::new(ClearPhase::Idle),
            listener: Arc::new(ClearMembershipListener {
                coordinator: me.clone(),
            }),
        });
        coordinator
            .channel
            .add_membership_listener(coordinator.listener.clone());
        coordinator
    }

    pub fn config(&self) -> &ClearConfig {
        &self.config
    }

    pub fn region_name(&self) -> &str {
        self.region.name()
    }

    pub fn local_member(&self) -> &MemberIdentity {
        self.channel.local_member()
    }

    /// The listener registered with the distribution channel.
    pub fn membership_listener(&self) -> Arc<ClearMembershipListener> {
        self.listener.clone()
    }

    /// Name of the distributed lock for this region.
    pub fn lock_name(&self) -> String {
        format!("{}{}", CLEAR_OPERATION, self.region.name())
    }

    pub fn phase(&self) -> ClearPhase {
        *self.phase.lock()
    }

    pub fn clear_lock(&self) -> &ClearLock {
        &self.clear_lock
    }

    pub fn is_locked_for_listener_and_client_notification(&self) -> bool {
        self.clear_lock.is_locked()
    }

    pub fn membership_change(&self) -> bool {
        self.membership_change.load(Ordering::Acquire)
    }

    pub fn set_membership_change(&self, changed: bool) {
        self.membership_change.store(changed, Ordering::Release);
    }

    fn advance(&self, next: ClearPhase) {
        let mut phase = self.phase.lock();
        if !phase.can_advance_to(next) && *phase != next {
            warn!(region = self.region.name(), from = %*phase, to = %next, "unexpected clear phase change");
        }
        debug!(region = self.region.name(), from = %*phase, to = %next, "clear phase");
        *phase = next;
    }

    // ---- distributed lock ----

    /// Take the cluster-wide lock `name`, waiting as configured.
    pub fn acquire_distributed_clear_lock(&self, name: &str) -> Result<()> {
        self.region
            .lock_service()
            .lock(name, self.config.lock_wait(), self.config.lock_lease())
            .map_err(|err| match err {
                MembershipError::LockTimeout { name } => ClearError::LockTimeout { name },
                other => other.into(),
            })?;
        debug!(region = self.region.name(), lock = name, "distributed clear lock acquired");
        Ok(())
    }

    pub fn release_distributed_clear_lock(&self, name: &str) -> Result<()> {
        self.region.lock_service().unlock(name)?;
        debug!(region = self.region.name(), lock = name, "distributed clear lock released");
        Ok(())
    }

    // ---- listener and client notification lock ----

    /// Take the clear lock here and on every other member hosting the region.
    pub fn obtain_lock_for_clear(&self, event: &RegionEvent) -> Result<()> {
        self.obtain_clear_lock_local(self.channel.local_member());
        self.send_partitioned_region_clear_message(event, OperationType::LockForPrClear)?;
        Ok(())
    }

    /// Release the clear lock here and on every other member.
    pub fn release_lock_for_clear(&self, event: &RegionEvent) -> Result<()> {
        self.release_clear_lock_local();
        self.send_partitioned_region_clear_message(event, OperationType::UnlockForPrClear)?;
        Ok(())
    }

    /// Lock the local primary buckets on behalf of `requester`. Ignored if
    /// the requester already left the cluster.
    pub fn obtain_clear_lock_local(&self, requester: &MemberIdentity) {
        if !self.channel.is_current_member(requester) {
            debug!(region = self.region.name(), requester = %requester, "requester left, not locking for clear");
            return;
        }
        self.clear_lock.set_locked(requester.clone());
        if let Some(store) = self.region.data_store() {
            for bucket in store.all_local_primary_buckets() {
                bucket.lock_locally_for_clear(requester);
            }
        }
        trace!(region = self.region.name(), requester = %requester, "locked for clear");
    }

    /// Release the local clear lock. Nothing happens if no one holds it.
    pub fn release_clear_lock_local(&self) {
        let Some(requester) = self.clear_lock.lock_requester() else {
            debug!(region = self.region.name(), "clear lock not held, nothing to release");
            return;
        };
        if let Some(store) = self.region.data_store() {
            // Primaries may have moved since locking.
            for bucket in store.all_local_buckets() {
                bucket.release_lock_locally_for_clear();
            }
        }
        self.clear_lock.set_unlocked();
        trace!(region = self.region.name(), requester = %requester, "released clear lock");
    }

    /// Release the clear lock if `member` held it.
    pub fn handle_clear_from_departed_member(&self, member: &MemberIdentity) {
        if self.clear_lock.is_held_by(member) {
            info!(region = self.region.name(), requester = %member, "clear requester departed, releasing clear lock");
            self.release_clear_lock_local();
        }
    }

    // ---- local clear ----

    /// Block until every local bucket has a primary, polling at the pace
    /// of `retry_timer`.
    pub fn wait_for_primary(&self, retry_timer: &mut dyn RetryTimer) -> Result<()> {
        let Some(store) = self.region.data_store() else {
            return Ok(());
        };
        loop {
            let mut retry = false;
            for bucket in store.all_local_buckets() {
                if bucket.has_primary() {
                    continue;
                }
                if retry_timer.over_maximum() {
                    warn!(region = self.region.name(), bucket = bucket.bucket_id(), "no primary found in time");
                    return Err(ClearError::primary_not_found(self.region.name()));
                }
                trace!(region = self.region.name(), bucket = bucket.bucket_id(), "waiting for primary");
                retry_timer.wait_for_buckets_recovery();
                retry = true;
                break;
            }
            if !retry {
                return Ok(());
            }
        }
    }

    /// Clear every local primary bucket and notify local listeners and
    /// clients. Returns the ids of the cleared buckets, repeated for each
    /// pass made.
    pub fn clear_region_local(&self, event: &RegionEvent) -> Result<Vec<u32>> {
        let mut cleared = Vec::new();
        self.set_membership_change(false);
        let Some(store) = self.region.data_store() else {
            self.do_after_clear(event);
            return Ok(cleared);
        };

        store.lock_bucket_creation_for_region_clear();
        let passes = self.clear_primaries_until_stable(store.as_ref(), &mut cleared);
        store.unlock_bucket_creation_for_region_clear();
        passes?;

        self.do_after_clear(event);
        Ok(cleared)
    }

    fn clear_primaries_until_stable(&self, store: &dyn BucketDataStore, cleared: &mut Vec<u32>) -> Result<()> {
        loop {
            let mut timer = RetryTimeKeeper::new(self.config.retry_timeout(), self.config.retry_interval());
            self.wait_for_primary(&mut timer)?;

            for bucket in store.all_local_primary_buckets() {
                let removed = bucket.clear();
                trace!(region = self.region.name(), bucket = bucket.bucket_id(), removed, "bucket cleared");
                cleared.push(bucket.bucket_id());
            }

            if self.membership_change.swap(false, Ordering::AcqRel) {
                info!(region = self.region.name(), "membership changed during clear, clearing local buckets again");
                continue;
            }
            return Ok(());
        }
    }

    /// Notify interested clients and local listeners of a clear.
    pub fn do_after_clear(&self, event: &RegionEvent) {
        if self.region.has_any_clients_interested() {
            let mut routed = event.clone();
            routed.set_local_filter_info(FilterInfo {
                clients: self.region.interested_clients(),
            });
            self.region.notify_bridge_clients(&routed);
        }
        if self.region.has_listener() {
            self.region
                .dispatch_listener_event(ListenerEvent::AfterRegionClear, event);
        }
    }

    // ---- remote clear ----

    /// Clear locally, then on every other member. Returns all cleared
    /// bucket ids.
    pub fn clear_region(&self, event: &RegionEvent) -> Result<Vec<u32>> {
        let mut cleared = self.clear_region_local(event)?;
        cleared.extend(self.send_partitioned_region_clear_message(event, OperationType::PrClear)?);
        Ok(cleared)
    }

    /// Send `operation` to every other member hosting the region and wait
    /// for their replies. The broadcast is repeated when a recipient
    /// leaves before replying.
    pub fn send_partitioned_region_clear_message(
        &self,
        event: &RegionEvent,
        operation: OperationType,
    ) -> Result<Vec<u32>> {
        let max_attempts = self.config.max_send_attempts.max(1);
        let mut attempt = 1;
        loop {
            if self.channel.is_cancelled() {
                return Err(ClearError::Cancelled);
            }
            match self.attempt_to_send_partitioned_region_clear_message(event, operation)? {
                SendAttempt::Replied(cleared) => return Ok(cleared),
                SendAttempt::Departed(departed) => {
                    if attempt >= max_attempts {
                        warn!(region = self.region.name(), %operation, attempt, "recipients kept departing");
                        return Err(ClearError::MemberDeparted {
                            member: departed.first().map(ToString::to_string).unwrap_or_default(),
                            operation: operation.to_string(),
                        });
                    }
                    debug!(region = self.region.name(), %operation, attempt, departed = departed.len(), "recipient departed, resending");
                    attempt += 1;
                }
            }
        }
    }

    fn attempt_to_send_partitioned_region_clear_message(
        &self,
        event: &RegionEvent,
        operation: OperationType,
    ) -> Result<SendAttempt> {
        let local = self.channel.local_member();
        let recipients: Vec<MemberIdentity> = self
            .region
            .persisted_nodes()
            .members()
            .filter(|member| *member != local && self.channel.is_current_member(member))
            .cloned()
            .collect();
        if recipients.is_empty() {
            return Ok(SendAttempt::Replied(Vec::new()));
        }

        let message = ClearMessage::new(local.clone(), operation, event);
        trace!(region = self.region.name(), %operation, recipients = recipients.len(), "sending clear message");
        let collector = self.channel.put_outgoing(message, &recipients)?;
        let outcome = collector.wait(self.config.ack_timeout())?;
        if !outcome.is_complete() {
            return Ok(SendAttempt::Departed(outcome.departed));
        }

        let mut cleared = Vec::new();
        for reply in outcome.replies {
            if let Some(reason) = reply.error {
                return Err(ClearError::Remote {
                    member: reply.sender.to_string(),
                    reason,
                });
            }
            cleared.extend(reply.cleared_buckets);
        }
        Ok(SendAttempt::Replied(cleared))
    }

    // ---- whole clear ----

    pub fn invoke_cache_writer(&self, event: &RegionEvent) -> Result<()> {
        self.region.invoke_cache_writer(event)
    }

    pub fn assign_all_primary_buckets(&self) -> Result<()> {
        self.region.assign_all_primary_buckets()
    }

    /// Clear the region on every member. Returns the cleared bucket ids.
    pub fn do_clear(&self, event: &RegionEvent, cache_write: bool) -> Result<Vec<u32>> {
        let lock_name = self.lock_name();
        self.advance(ClearPhase::Idle);
        self.acquire_distributed_clear_lock(&lock_name)?;
        self.advance(ClearPhase::LockAcquired);
        info!(region = self.region.name(), event = %event.id, "clearing region");

        let cleared = self.clear_while_locked(event, cache_write);
        if cleared.is_err() && self.phase() == ClearPhase::Clearing {
            self.advance(ClearPhase::PartialFailure);
        }

        let released = self.release_distributed_clear_lock(&lock_name);
        if self.phase() != ClearPhase::PartialFailure {
            self.advance(ClearPhase::Unlocked);
        }
        let cleared = match (cleared, released) {
            (Ok(cleared), Ok(())) => cleared,
            (Err(err), released) => {
                if let Err(release_err) = released {
                    warn!(region = self.region.name(), %release_err, "failed to release clear lock");
                }
                self.advance(ClearPhase::PartialFailure);
                return Err(err);
            }
            (Ok(_), Err(err)) => {
                self.advance(ClearPhase::PartialFailure);
                return Err(err);
            }
        };

        let distinct: BTreeSet<u32> = cleared.iter().copied().collect();
        let expected = self.region.total_bucket_count();
        if distinct.len() as u32 != expected {
            warn!(region = self.region.name(), expected, actual = distinct.len(), "not every bucket was cleared");
            self.advance(ClearPhase::PartialFailure);
            return Err(ClearError::incomplete(self.region.name()));
        }

        self.advance(ClearPhase::Done);
        info!(region = self.region.name(), buckets = expected, "region cleared");
        Ok(cleared)
    }

    fn clear_while_locked(&self, event: &RegionEvent, cache_write: bool) -> Result<Vec<u32>> {
        if cache_write {
            self.invoke_cache_writer(event)?;
        }

        let notify = self.region.has_any_clients_interested() || self.region.has_listener();
        if !notify {
            return self.assign_and_clear(event);
        }

        let cleared = self
            .obtain_lock_for_clear(event)
            .and_then(|()| self.assign_and_clear(event));
        let released = self.release_lock_for_clear(event);
        match (cleared, released) {
            (Ok(cleared), Ok(())) => Ok(cleared),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), released) => {
                if let Err(release_err) = released {
                    warn!(region = self.region.name(), %release_err, "failed to release lock for clear");
                }
                Err(err)
            }
        }
    }

    fn assign_and_clear(&self, event: &RegionEvent) -> Result<Vec<u32>> {
        self.assign_all_primary_buckets()?;
        self.advance(ClearPhase::Clearing);
        self.clear_region(event)
    }
}

impl ClearMessageHandler for ClearCoordinator {
    fn process(&self, message: &ClearMessage) -> ClearReply {
        let local = self.channel.local_member().clone();
        trace!(region = self.region.name(), from = %message.sender, operation = %message.operation, "processing clear message");
        if message.region != self.region.name() {
            return ClearReply::failed(message, local, format!("region {} is not hosted here", message.region));
        }
        match message.operation {
            OperationType::LockForPrClear => {
                self.obtain_clear_lock_local(&message.sender);
                ClearReply::ok(message, local, Vec::new())
            }
            OperationType::UnlockForPrClear => {
                self.release_clear_lock_local();
                ClearReply::ok(message, local, Vec::new())
            }
            OperationType::PrClear => match self.clear_region_local(&message.event) {
                Ok(cleared) => ClearReply::ok(message, local, cleared),
                Err(err) => {
                    warn!(region = self.region.name(), %err, "local clear failed");
                    ClearReply::failed(message, local, err)
                }
            },
        }
    }
}

/// Tracks departures for a [`ClearCoordinator`].
///
/// Every departure marks a membership change. The departure of the member
/// holding the local clear lock also releases that lock.
pub struct ClearMembershipListener {
    coordinator: Weak<ClearCoordinator>,
}

impl MembershipListener for ClearMembershipListener {
    fn member_departed(&self, member: &MemberIdentity, crashed: bool) {
        let Some(coordinator) = self.coordinator.upgrade() else {
            return;
        };
        trace!(region = coordinator.region_name(), member = %member, crashed, "member departed");
        coordinator.set_membership_change(true);
        coordinator.handle_clear_from_departed_member(member);
    }
}
