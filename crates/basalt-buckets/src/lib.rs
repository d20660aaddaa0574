//! # basalt-buckets
//!
//! Buckets of a partitioned Basalt region.
//!
//! This crate provides:
//! - Bucket advisors: per-bucket primary election, redundancy tracking,
//!   shadow-bucket bookkeeping and client server locations
//! - Volunteering strategies injected into advisors at construction
//! - Bucket regions: a bucket's entry map with primary-only authority for
//!   local operations and a gate that holds operations off during a clear
//! - The per-member data store of hosted buckets
//!
//! ## Example
//!
//! ```rust
//! use basalt_buckets::{BucketAdvisor, MembershipRegionAdvisor, PrimaryState};
//! use basalt_membership::{MemberIdentity, MembershipView};
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! let me = MemberIdentity::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40404);
//! let view = Arc::new(MembershipView::with_members([me.clone()]));
//! let region = Arc::new(MembershipRegionAdvisor::new("/orders", 0, view));
//! region.add_host(me.clone());
//!
//! let advisor = BucketAdvisor::with_immediate_volunteering(0, me.clone(), region);
//! advisor.open_initialization_gate();
//! advisor.set_hosting(true);
//! assert!(advisor.volunteer_for_primary());
//! assert_eq!(advisor.primary_state(), PrimaryState::IsPrimaryHosting);
//! ```

pub mod advisor;
pub mod bucket;
pub mod config;
pub mod delegate;
pub mod error;
pub mod gate;
pub mod region_advisor;
pub mod server;
pub mod store;

pub use advisor::{BucketAdvisor, PrimaryState};
pub use bucket::BucketRegion;
pub use config::{BucketConfig, BucketConfigBuilder};
pub use delegate::{ImmediateVolunteering, PassiveVolunteering, VolunteeringDelegate};
pub use error::{BucketError, Result, ServerError};
pub use gate::ClearGate;
pub use region_advisor::{MembershipRegionAdvisor, RegionAdvisor};
pub use server::{BucketServerLocation, CacheServer, LocalCacheServer};
pub use store::{BucketDataStore, ClearableBucket, PartitionedRegionDataStore};
