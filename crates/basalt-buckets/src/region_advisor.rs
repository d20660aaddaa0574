//! Region-level knowledge consulted by bucket advisors.

use basalt_membership::{MemberIdentity, MembershipListener, MembershipView};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// What a bucket advisor needs to know about its partitioned region.
pub trait RegionAdvisor: Send + Sync {
    /// Full path of the partitioned region.
    fn region_path(&self) -> &str;

    fn redundant_copies(&self) -> u32;

    /// True if `member` is current and has created the partitioned region.
    fn has_partitioned_region(&self, member: &MemberIdentity) -> bool;

    /// Every member that hosts the partitioned region.
    fn partitioned_region_members(&self) -> Vec<MemberIdentity>;
}

/// A [`RegionAdvisor`] backed by a membership view and a set of region
/// hosts. Hosts that depart are forgotten.
pub struct MembershipRegionAdvisor {
    region_path: String,
    redundant_copies: u32,
    view: Arc<MembershipView>,
    hosts: RwLock<BTreeSet<MemberIdentity>>,
}

impl MembershipRegionAdvisor {
    pub fn new(region_path: impl Into<String>, redundant_copies: u32, view: Arc<MembershipView>) -> Self {
        MembershipRegionAdvisor {
            region_path: region_path.into(),
            redundant_copies,
            view,
            hosts: RwLock::new(BTreeSet::new()),
        }
    }

    /// Record that `member` created the region.
    pub fn add_host(&self, member: MemberIdentity) {
        self.hosts.write().insert(member);
    }

    /// Record that `member` closed the region.
    pub fn remove_host(&self, member: &MemberIdentity) -> bool {
        self.hosts.write().remove(member)
    }

    pub fn view(&self) -> &Arc<MembershipView> {
        &self.view
    }
}

impl RegionAdvisor for MembershipRegionAdvisor {
    fn region_path(&self) -> &str {
        &self.region_path
    }

    fn redundant_copies(&self) -> u32 {
        self.redundant_copies
    }

    fn has_partitioned_region(&self, member: &MemberIdentity) -> bool {
        self.view.is_current_member(member) && self.hosts.read().contains(member)
    }

    fn partitioned_region_members(&self) -> Vec<MemberIdentity> {
        self.hosts
            .read()
            .iter()
            .filter(|m| self.view.is_current_member(m))
            .cloned()
            .collect()
    }
}

impl MembershipListener for MembershipRegionAdvisor {
    fn member_departed(&self, member: &MemberIdentity, _crashed: bool) {
        if self.remove_host(member) {
            debug!(region = %self.region_path, member = %member, "region host departed");
        }
    }
}
