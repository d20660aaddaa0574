//! Membership view and change notification.
//!
//! The view tracks which members are currently part of the distributed
//! system. Listeners are notified of joins and departures after the view
//! lock is released, so a listener may call back into the view.

use crate::member::MemberIdentity;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// A change in membership.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipEvent {
    Joined(MemberIdentity),
    Departed { member: MemberIdentity, crashed: bool },
}

/// Receives membership change notifications.
///
/// Callbacks run on the thread that applied the change and must not block
/// waiting on application threads.
pub trait MembershipListener: Send + Sync {
    fn member_joined(&self, _member: &MemberIdentity) {}

    fn member_departed(&self, member: &MemberIdentity, crashed: bool);
}

struct ViewState {
    view_id: u64,
    members: BTreeSet<MemberIdentity>,
}

/// The current set of members of the distributed system.
pub struct MembershipView {
    state: RwLock<ViewState>,
    listeners: RwLock<Vec<Arc<dyn MembershipListener>>>,
}

impl MembershipView {
    pub fn new() -> Self {
        MembershipView {
            state: RwLock::new(ViewState {
                view_id: 0,
                members: BTreeSet::new(),
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Create a view that already contains the given members.
    pub fn with_members(members: impl IntoIterator<Item = MemberIdentity>) -> Self {
        let view = MembershipView::new();
        {
            let mut state = view.state.write();
            state.members.extend(members);
            state.view_id = 1;
        }
        view
    }

    /// Register a listener for subsequent changes.
    pub fn add_listener(&self, listener: Arc<dyn MembershipListener>) {
        self.listeners.write().push(listener);
    }

    /// Current view id. Every applied change increments it.
    pub fn view_id(&self) -> u64 {
        self.state.read().view_id
    }

    pub fn is_current_member(&self, member: &MemberIdentity) -> bool {
        self.state.read().members.contains(member)
    }

    pub fn members(&self) -> Vec<MemberIdentity> {
        self.state.read().members.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().members.is_empty()
    }

    /// Add a member to the view. Returns false if it was already present.
    pub fn join(&self, member: MemberIdentity) -> bool {
        {
            let mut state = self.state.write();
            if !state.members.insert(member.clone()) {
                return false;
            }
            state.view_id += 1;
            debug!(member = %member, view_id = state.view_id, "member joined");
        }
        self.notify(&MembershipEvent::Joined(member));
        true
    }

    /// Remove a member from the view. Returns false if it was not present.
    pub fn depart(&self, member: &MemberIdentity, crashed: bool) -> bool {
        {
            let mut state = self.state.write();
            if !state.members.remove(member) {
                return false;
            }
            state.view_id += 1;
            info!(member = %member, crashed, view_id = state.view_id, "member departed");
        }
        self.notify(&MembershipEvent::Departed {
            member: member.clone(),
            crashed,
        });
        true
    }

    fn notify(&self, event: &MembershipEvent) {
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        for listener in listeners {
            match event {
                MembershipEvent::Joined(member) => listener.member_joined(member),
                MembershipEvent::Departed { member, crashed } => {
                    listener.member_departed(member, *crashed)
                }
            }
        }
    }
}

impl Default for MembershipView {
    fn default() -> Self {
        Self::new()
    }
}
