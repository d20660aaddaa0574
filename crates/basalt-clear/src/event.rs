//! Region-level events raised by a clear.

use basalt_entries::{EventId, Operation};
use basalt_membership::MemberIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Listener callbacks a region can dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListenerEvent {
    AfterRegionClear,
}

/// Clients whose subscriptions match an event on this member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterInfo {
    pub clients: BTreeSet<String>,
}

/// An operation on a whole region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionEvent {
    pub id: EventId,
    pub region: String,
    pub origin: MemberIdentity,
    pub operation: Operation,
    pub origin_remote: bool,
    pub callback_argument: Option<String>,
    filter_info: Option<FilterInfo>,
}

impl RegionEvent {
    pub fn clear(region: impl Into<String>, origin: MemberIdentity) -> Self {
        RegionEvent {
            id: EventId::new(),
            region: region.into(),
            origin,
            operation: Operation::RegionClear,
            origin_remote: false,
            callback_argument: None,
            filter_info: None,
        }
    }

    pub fn with_callback_argument(mut self, argument: impl Into<String>) -> Self {
        self.callback_argument = Some(argument.into());
        self
    }

    /// The same event as seen by a member that did not originate it.
    pub fn to_remote(&self) -> Self {
        let mut event = self.clone();
        event.origin_remote = true;
        event.filter_info = None;
        event
    }

    pub fn set_local_filter_info(&mut self, info: FilterInfo) {
        self.filter_info = Some(info);
    }

    pub fn local_filter_info(&self) -> Option<&FilterInfo> {
        self.filter_info.as_ref()
    }
}
