//! # basalt-versions
//!
//! Version bookkeeping for the Basalt data grid.
//!
//! Operations carry a [`VersionTag`] naming the member that performed them,
//! a per-entry version and a per-region version. Entries keep a
//! [`VersionStamp`] of the last operation they applied, and each region keeps
//! a [`RegionVersionVector`] recording which region versions from each member
//! have been applied, including gaps left by out-of-order delivery.
//!
//! [`check_for_conflict`] decides whether an incoming operation is newer than
//! an entry's stamp; the decision is a pure function of the two versions and
//! the member order, so all replicas agree.
//!
//! ## Example
//!
//! ```rust
//! use basalt_membership::MemberIdentity;
//! use basalt_versions::{check_for_conflict, ConflictOutcome, VersionStamp, VersionTag};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
//! let a = MemberIdentity::new(addr, 1);
//! let b = MemberIdentity::new(addr, 2);
//!
//! let stamp = VersionStamp::from_tag(&VersionTag::new(a, 4, 10));
//! let incoming = VersionTag::new(b, 4, 3);
//! assert_eq!(check_for_conflict(&stamp, &incoming), ConflictOutcome::Apply);
//! ```

pub mod conflict;
pub mod error;
pub mod holder;
pub mod tag;
pub mod vector;

pub use conflict::{check_absent_key, check_for_conflict, ConflictOutcome};
pub use error::{Result, VersionError};
pub use holder::{RegionVersionHolder, VersionException};
pub use tag::{VersionStamp, VersionTag};
pub use vector::{RegionVersionVector, SharedVersionVector};
