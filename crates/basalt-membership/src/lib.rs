//! # basalt-membership
//!
//! Identity and membership primitives for the Basalt data grid.
//!
//! This crate provides:
//! - Member identity: a comparable, hashable identity with a total order used
//!   as the tie-breaker wherever conflict resolution needs one
//! - Membership view: the set of current members plus join/departure
//!   notification to registered listeners
//! - Distributed locks: the named, cluster-wide mutual exclusion contract and
//!   an in-process grantor shared by simulated members
//!
//! ## Example
//!
//! ```rust
//! use basalt_membership::{MemberIdentity, MembershipView};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
//! let a = MemberIdentity::new(addr, 40404).with_name("server-a");
//! let b = MemberIdentity::new(addr, 40405).with_name("server-b");
//! assert!(a < b);
//!
//! let view = MembershipView::new();
//! view.join(a.clone());
//! assert!(view.is_current_member(&a));
//! ```

pub mod dlock;
pub mod error;
pub mod member;
pub mod view;

pub use dlock::{DistributedLockService, LockGrantor, MemberLockService};
pub use error::{MembershipError, Result};
pub use member::{MemberIdentity, MemberIdentityBuilder};
pub use view::{MembershipEvent, MembershipListener, MembershipView};
