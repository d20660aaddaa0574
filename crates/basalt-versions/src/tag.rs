//! Version tags and per-entry version stamps.
//!
//! A [`VersionTag`] travels with an operation and identifies where and when
//! it happened. A [`VersionStamp`] is what an entry keeps after applying an
//! operation, so later operations can be compared against it.

use basalt_membership::MemberIdentity;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stamp carried by an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTag {
    member: MemberIdentity,
    entry_version: u64,
    region_version: u64,
    distributed_timestamp: i64,
    previous_member: Option<MemberIdentity>,
}

impl VersionTag {
    /// Create a tag stamped with the current wall-clock time.
    pub fn new(member: MemberIdentity, entry_version: u64, region_version: u64) -> Self {
        VersionTag {
            member,
            entry_version,
            region_version,
            distributed_timestamp: Utc::now().timestamp_millis(),
            previous_member: None,
        }
    }

    /// A tag that identifies the member but carries no version.
    pub fn unversioned(member: MemberIdentity) -> Self {
        VersionTag::new(member, 0, 0)
    }

    pub fn with_timestamp(mut self, millis: i64) -> Self {
        self.distributed_timestamp = millis;
        self
    }

    /// Record the member that produced the version this one replaces.
    pub fn with_previous_member(mut self, member: MemberIdentity) -> Self {
        self.previous_member = Some(member);
        self
    }

    pub fn member(&self) -> &MemberIdentity {
        &self.member
    }

    pub fn entry_version(&self) -> u64 {
        self.entry_version
    }

    pub fn region_version(&self) -> u64 {
        self.region_version
    }

    /// Milliseconds since the Unix epoch on the originating member.
    pub fn distributed_timestamp(&self) -> i64 {
        self.distributed_timestamp
    }

    pub fn previous_member(&self) -> Option<&MemberIdentity> {
        self.previous_member.as_ref()
    }

    /// True if either counter has been assigned.
    pub fn has_valid_version(&self) -> bool {
        self.entry_version != 0 || self.region_version != 0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{v{}; rv{}; mbr={}; time={}}}",
            self.entry_version, self.region_version, self.member, self.distributed_timestamp
        )
    }
}

/// Version information retained by an entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp {
    member: Option<MemberIdentity>,
    entry_version: u64,
    region_version: u64,
    timestamp: i64,
}

impl VersionStamp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tag(tag: &VersionTag) -> Self {
        let mut stamp = VersionStamp::new();
        stamp.apply_tag(tag);
        stamp
    }

    /// Overwrite this stamp with the versions carried by `tag`.
    pub fn apply_tag(&mut self, tag: &VersionTag) {
        self.member = Some(tag.member.clone());
        self.entry_version = tag.entry_version;
        self.region_version = tag.region_version;
        self.timestamp = tag.distributed_timestamp;
    }

    /// The tag a local operation on this entry would carry next.
    pub fn next_tag(&self, member: MemberIdentity, region_version: u64) -> VersionTag {
        let mut tag = VersionTag::new(member, self.entry_version + 1, region_version);
        if let Some(previous) = &self.member {
            tag.previous_member = Some(previous.clone());
        }
        tag
    }

    /// The stamp expressed as a tag, if it has ever been versioned.
    pub fn as_tag(&self) -> Option<VersionTag> {
        self.member.as_ref().map(|member| VersionTag {
            member: member.clone(),
            entry_version: self.entry_version,
            region_version: self.region_version,
            distributed_timestamp: self.timestamp,
            previous_member: None,
        })
    }

    pub fn member(&self) -> Option<&MemberIdentity> {
        self.member.as_ref()
    }

    pub fn entry_version(&self) -> u64 {
        self.entry_version
    }

    pub fn region_version(&self) -> u64 {
        self.region_version
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn is_versioned(&self) -> bool {
        self.member.is_some()
    }
}
