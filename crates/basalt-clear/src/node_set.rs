//! Members recorded as hosting a partitioned region.

use crate::error::Result;
use basalt_membership::MemberIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The region's node set as kept in its persisted configuration. A clear
/// broadcast targets these members.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedNodeSet {
    nodes: BTreeSet<MemberIdentity>,
}

impl PersistedNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, member: MemberIdentity) -> bool {
        self.nodes.insert(member)
    }

    pub fn remove_node(&mut self, member: &MemberIdentity) -> bool {
        self.nodes.remove(member)
    }

    pub fn contains(&self, member: &MemberIdentity) -> bool {
        self.nodes.contains(member)
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberIdentity> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl FromIterator<MemberIdentity> for PersistedNodeSet {
    fn from_iter<I: IntoIterator<Item = MemberIdentity>>(iter: I) -> Self {
        PersistedNodeSet {
            nodes: iter.into_iter().collect(),
        }
    }
}
