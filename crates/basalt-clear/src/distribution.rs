//! The distribution layer as seen by a clear.
//!
//! Sending is asynchronous: [`DistributionChannel::put_outgoing`] hands the
//! message off and returns a [`ReplyCollector`] at once. Waiting for
//! acknowledgement is a separate, bounded call on the collector.

use crate::error::{ClearError, Result};
use crate::message::{ClearMessage, ClearReply};
use basalt_membership::{MemberIdentity, MembershipListener};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Messaging and membership services of the local member.
pub trait DistributionChannel: Send + Sync {
    /// Identity of the local member.
    fn local_member(&self) -> &MemberIdentity;

    fn is_current_member(&self, member: &MemberIdentity) -> bool;

    fn add_membership_listener(&self, listener: Arc<dyn MembershipListener>);

    /// Send `message` to `recipients`. Replies arrive on the returned
    /// collector.
    fn put_outgoing(&self, message: ClearMessage, recipients: &[MemberIdentity]) -> Result<Arc<ReplyCollector>>;

    /// True once the local member is shutting down.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Processes clear messages arriving at a member.
pub trait ClearMessageHandler: Send + Sync {
    fn process(&self, message: &ClearMessage) -> ClearReply;
}

/// What came back from one broadcast.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub replies: Vec<ClearReply>,
    /// Recipients that left before replying.
    pub departed: Vec<MemberIdentity>,
}

impl BroadcastOutcome {
    pub fn is_complete(&self) -> bool {
        self.departed.is_empty()
    }
}

#[derive(Debug)]
struct CollectorState {
    pending: BTreeSet<MemberIdentity>,
    outcome: BroadcastOutcome,
}

/// Gathers the replies to one message.
#[derive(Debug)]
pub struct ReplyCollector {
    state: Mutex<CollectorState>,
    changed: Condvar,
}

impl ReplyCollector {
    pub fn new(recipients: impl IntoIterator<Item = MemberIdentity>) -> Self {
        ReplyCollector {
            state: Mutex::new(CollectorState {
                pending: recipients.into_iter().collect(),
                outcome: BroadcastOutcome::default(),
            }),
            changed: Condvar::new(),
        }
    }

    /// Record a reply. Replies from members not waited on are ignored.
    pub fn reply(&self, reply: ClearReply) {
        let mut st = self.state.lock();
        if st.pending.remove(&reply.sender) {
            trace!(from = %reply.sender, "clear reply received");
            st.outcome.replies.push(reply);
            self.changed.notify_all();
        }
    }

    /// Stop waiting on a member that left.
    pub fn member_departed(&self, member: &MemberIdentity) {
        let mut st = self.state.lock();
        if st.pending.remove(member) {
            st.outcome.departed.push(member.clone());
            self.changed.notify_all();
        }
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Block until every recipient replied or departed.
    pub fn wait(&self, timeout: Duration) -> Result<BroadcastOutcome> {
        let deadline = Instant::now() + timeout;
        let mut st = self.state.lock();
        while !st.pending.is_empty() {
            if self.changed.wait_until(&mut st, deadline).timed_out() && !st.pending.is_empty() {
                return Err(ClearError::ReplyTimeout {
                    pending: st.pending.len(),
                });
            }
        }
        Ok(std::mem::take(&mut st.outcome))
    }
}
