//! Region version vectors.
//!
//! Each region keeps one vector: for every member, the region versions of
//! that member's operations that have been applied locally. The vector
//! also hands out this member's own region versions and remembers, per
//! member, the highest version whose tombstones may be collected.
//!
//! ## Example
//!
//! ```rust
//! use basalt_membership::MemberIdentity;
//! use basalt_versions::RegionVersionVector;
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
//! let me = MemberIdentity::new(addr, 1);
//! let peer = MemberIdentity::new(addr, 2);
//!
//! let mut rvv = RegionVersionVector::new(me.clone());
//! assert_eq!(rvv.next_region_version(), 1);
//! rvv.record_version(&peer, 3);
//! assert!(rvv.contains(&peer, 3));
//! assert!(!rvv.contains(&peer, 2));
//! ```

use crate::error::{Result, VersionError};
use crate::holder::RegionVersionHolder;
use crate::tag::VersionTag;
use basalt_membership::MemberIdentity;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// A region version vector shared between the entry map and its owner.
pub type SharedVersionVector = Arc<RwLock<RegionVersionVector>>;

/// Applied region versions per member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionVersionVector {
    owner: MemberIdentity,
    local_version: u64,
    #[serde(with = "member_map")]
    holders: BTreeMap<MemberIdentity, RegionVersionHolder>,
    #[serde(with = "member_map")]
    gc_versions: BTreeMap<MemberIdentity, u64>,
}

impl RegionVersionVector {
    /// Create an empty vector owned by `owner`.
    pub fn new(owner: MemberIdentity) -> Self {
        RegionVersionVector {
            owner,
            local_version: 0,
            holders: BTreeMap::new(),
            gc_versions: BTreeMap::new(),
        }
    }

    /// Wrap this vector for sharing.
    pub fn into_shared(self) -> SharedVersionVector {
        Arc::new(RwLock::new(self))
    }

    pub fn owner(&self) -> &MemberIdentity {
        &self.owner
    }

    /// The most recent region version handed out by this member.
    pub fn local_version(&self) -> u64 {
        self.local_version
    }

    /// Allocate and record the next region version for a local operation.
    pub fn next_region_version(&mut self) -> u64 {
        self.local_version += 1;
        let version = self.local_version;
        let owner = self.owner.clone();
        self.holders.entry(owner).or_default().record_version(version);
        version
    }

    /// Record `version` from `member`. Returns false if already recorded.
    pub fn record_version(&mut self, member: &MemberIdentity, version: u64) -> bool {
        if member == &self.owner && version > self.local_version {
            self.local_version = version;
        }
        let recorded = self
            .holders
            .entry(member.clone())
            .or_default()
            .record_version(version);
        if recorded {
            trace!(member = %member, version, "recorded region version");
        }
        recorded
    }

    /// Record the region version carried by `tag`.
    pub fn record_tag(&mut self, tag: &VersionTag) -> Result<bool> {
        if tag.region_version() == 0 {
            return Err(VersionError::InvalidTag {
                member: tag.member().to_string(),
            });
        }
        Ok(self.record_version(tag.member(), tag.region_version()))
    }

    /// True if `version` from `member` has been applied.
    pub fn contains(&self, member: &MemberIdentity, version: u64) -> bool {
        match self.holders.get(member) {
            Some(holder) => holder.contains(version),
            None => version == 0,
        }
    }

    /// True if the region version carried by `tag` has been applied.
    pub fn contains_tag(&self, tag: &VersionTag) -> bool {
        tag.region_version() != 0 && self.contains(tag.member(), tag.region_version())
    }

    /// Highest version recorded for `member`, 0 if none.
    pub fn version_for(&self, member: &MemberIdentity) -> u64 {
        self.holders.get(member).map(|h| h.version()).unwrap_or(0)
    }

    pub fn holder(&self, member: &MemberIdentity) -> Result<&RegionVersionHolder> {
        self.holders
            .get(member)
            .ok_or_else(|| VersionError::MissingMember(member.to_string()))
    }

    /// Members with recorded versions, ascending.
    pub fn members(&self) -> impl Iterator<Item = &MemberIdentity> {
        self.holders.keys()
    }

    /// Absorb every version recorded by `other`, as done after an initial
    /// image transfer. GC versions only move forward.
    pub fn merge(&mut self, other: &RegionVersionVector) {
        for (member, holder) in &other.holders {
            self.holders.entry(member.clone()).or_default().merge(holder);
        }
        for (member, &version) in &other.gc_versions {
            let gc = self.gc_versions.entry(member.clone()).or_insert(0);
            *gc = (*gc).max(version);
        }
        if let Some(own) = self.holders.get(&self.owner) {
            self.local_version = self.local_version.max(own.version());
        }
    }

    /// True if every version recorded by `other` is recorded here.
    pub fn dominates(&self, other: &RegionVersionVector) -> bool {
        other.holders.iter().all(|(member, theirs)| match self.holders.get(member) {
            Some(mine) => mine.dominates(theirs),
            None => theirs.version() == 0,
        })
    }

    /// Allow tombstones from `member` at or below `version` to be collected.
    pub fn record_gc_version(&mut self, member: &MemberIdentity, version: u64) {
        let gc = self.gc_versions.entry(member.clone()).or_insert(0);
        if version > *gc {
            *gc = version;
        }
    }

    pub fn gc_version(&self, member: &MemberIdentity) -> u64 {
        self.gc_versions.get(member).copied().unwrap_or(0)
    }

    /// True if a tombstone stamped `version` by `member` may be collected.
    pub fn is_tombstone_collectable(&self, member: &MemberIdentity, version: u64) -> bool {
        version <= self.gc_version(member)
    }

    /// A vector whose GC versions are this vector's current versions.
    pub fn gc_snapshot(&self) -> RegionVersionVector {
        let mut snapshot = RegionVersionVector::new(self.owner.clone());
        for (member, holder) in &self.holders {
            let safe = holder
                .exceptions()
                .first()
                .map(|gap| gap.from - 1)
                .unwrap_or(holder.version());
            snapshot.record_gc_version(member, safe);
        }
        snapshot
    }
}

/// Serialize member-keyed maps as sequences of pairs so they survive
/// formats that only allow string keys.
mod member_map {
    use basalt_membership::MemberIdentity;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, V>(map: &BTreeMap<MemberIdentity, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<MemberIdentity, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let pairs: Vec<(MemberIdentity, V)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
