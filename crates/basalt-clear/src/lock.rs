//! The local lock that orders listener and client notification of a clear.

use basalt_membership::MemberIdentity;
use parking_lot::Mutex;

/// Records which member holds this member's clear lock, if any.
#[derive(Debug, Default)]
pub struct ClearLock {
    requester: Mutex<Option<MemberIdentity>>,
}

impl ClearLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_locked(&self, requester: MemberIdentity) {
        *self.requester.lock() = Some(requester);
    }

    /// Clear the holder and return it.
    pub fn set_unlocked(&self) -> Option<MemberIdentity> {
        self.requester.lock().take()
    }

    pub fn lock_requester(&self) -> Option<MemberIdentity> {
        self.requester.lock().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.requester.lock().is_some()
    }

    /// True if `member` holds the lock.
    pub fn is_held_by(&self, member: &MemberIdentity) -> bool {
        self.requester.lock().as_ref() == Some(member)
    }
}
