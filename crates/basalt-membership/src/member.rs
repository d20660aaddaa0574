//! Member identity with a deterministic total order.
//!
//! Every replica must reach the same decision when two updates carry
//! otherwise-equal versions, so the identity of the originating member is
//! the final tie-breaker. The order compares, in turn:
//!
//! 1. the membership port
//! 2. the raw address bytes (lexicographic, a shorter address sorts first)
//! 3. the member name (an absent name sorts first)
//! 4. the unique tag (an absent tag sorts first); when both tags are absent
//!    the view id the member joined in is compared instead
//!
//! Equality and hashing agree with this order, so identities can be used as
//! `BTreeMap` and `HashMap` keys interchangeably.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

/// Identity of a cluster participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberIdentity {
    address: IpAddr,
    membership_port: u16,
    process_id: u32,
    view_id: i32,
    name: Option<String>,
    unique_tag: Option<String>,
}

impl MemberIdentity {
    /// Create an identity from an address and membership port.
    pub fn new(address: IpAddr, membership_port: u16) -> Self {
        MemberIdentity {
            address,
            membership_port,
            process_id: 0,
            view_id: -1,
            name: None,
            unique_tag: None,
        }
    }

    /// Start building an identity.
    pub fn builder(address: IpAddr, membership_port: u16) -> MemberIdentityBuilder {
        MemberIdentityBuilder {
            member: MemberIdentity::new(address, membership_port),
        }
    }

    /// Set the member name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the view id the member joined in.
    pub fn with_view_id(mut self, view_id: i32) -> Self {
        self.view_id = view_id;
        self
    }

    /// Set the unique tag used by loner/client members.
    pub fn with_unique_tag(mut self, tag: impl Into<String>) -> Self {
        self.unique_tag = Some(tag.into());
        self
    }

    /// Set the operating system process id.
    pub fn with_process_id(mut self, process_id: u32) -> Self {
        self.process_id = process_id;
        self
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn membership_port(&self) -> u16 {
        self.membership_port
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// View id the member joined in, or -1 if unknown.
    pub fn view_id(&self) -> i32 {
        self.view_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn unique_tag(&self) -> Option<&str> {
        self.unique_tag.as_deref()
    }

    fn address_bytes(&self) -> Vec<u8> {
        match self.address {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        }
    }
}

impl Ord for MemberIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.membership_port
            .cmp(&other.membership_port)
            .then_with(|| self.address_bytes().cmp(&other.address_bytes()))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| match (&self.unique_tag, &other.unique_tag) {
                (None, None) => self.view_id.cmp(&other.view_id),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(mine), Some(theirs)) => mine.cmp(theirs),
            })
    }
}

impl PartialOrd for MemberIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MemberIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MemberIdentity {}

impl Hash for MemberIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.membership_port.hash(state);
        self.address_bytes().hash(state);
        self.name.hash(state);
        match &self.unique_tag {
            Some(tag) => tag.hash(state),
            None => self.view_id.hash(state),
        }
    }
}

impl fmt::Display for MemberIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        match &self.name {
            Some(name) => write!(f, "({}:{})", name, self.process_id)?,
            None => write!(f, "({})", self.process_id)?,
        }
        if self.view_id >= 0 {
            write!(f, "<v{}>", self.view_id)?;
        }
        write!(f, ":{}", self.membership_port)?;
        if let Some(tag) = &self.unique_tag {
            write!(f, ":{}", tag)?;
        }
        Ok(())
    }
}

/// Builder for member identities.
pub struct MemberIdentityBuilder {
    member: MemberIdentity,
}

impl MemberIdentityBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.member.name = Some(name.into());
        self
    }

    pub fn view_id(mut self, view_id: i32) -> Self {
        self.member.view_id = view_id;
        self
    }

    pub fn unique_tag(mut self, tag: impl Into<String>) -> Self {
        self.member.unique_tag = Some(tag.into());
        self
    }

    pub fn process_id(mut self, process_id: u32) -> Self {
        self.member.process_id = process_id;
        self
    }

    pub fn build(self) -> MemberIdentity {
        self.member
    }
}
