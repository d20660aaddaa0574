//! A lock that is taken in one call and released in another.
//!
//! Clear locks are acquired on behalf of a member, possibly a remote one,
//! and released by a later message, so they cannot be scoped guards.
//! Operations that must not overlap a clear pass through the gate and
//! block while it is closed.

use basalt_membership::MemberIdentity;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Default)]
pub struct ClearGate {
    holder: Mutex<Option<MemberIdentity>>,
    opened: Condvar,
}

impl ClearGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate on behalf of `holder`, waiting for any other holder
    /// to open it first. Closing a gate already held by `holder` is a no-op.
    pub fn close(&self, holder: &MemberIdentity) {
        let mut current = self.holder.lock();
        loop {
            match current.as_ref() {
                None => break,
                Some(h) if h == holder => return,
                Some(_) => self.opened.wait(&mut current),
            }
        }
        *current = Some(holder.clone());
        trace!(holder = %holder, "clear gate closed");
    }

    /// Open the gate. Returns the previous holder.
    pub fn open(&self) -> Option<MemberIdentity> {
        let previous = self.holder.lock().take();
        self.opened.notify_all();
        previous
    }

    pub fn holder(&self) -> Option<MemberIdentity> {
        self.holder.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.holder.lock().is_some()
    }

    /// Wait until the gate is open. Returns false if it stayed closed for
    /// `timeout`.
    pub fn pass(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut current = self.holder.lock();
        while current.is_some() {
            if self.opened.wait_until(&mut current, deadline).timed_out() {
                return current.is_none();
            }
        }
        true
    }
}
