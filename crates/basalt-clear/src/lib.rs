//! # basalt-clear
//!
//! Cluster-wide clear of a partitioned Basalt region.
//!
//! This crate provides:
//! - The clear coordinator: distributed lock, listener/client notification
//!   lock, primary assignment and the per-member bucket clear with retry
//!   on membership change
//! - Clear messages and replies exchanged between members
//! - A loopback distribution fabric connecting simulated members
//! - A partitioned region and a simulated cluster of its members
//!
//! ## Example
//!
//! ```rust
//! use basalt_buckets::BucketConfig;
//! use basalt_clear::{ClearConfig, RegionCluster};
//! use basalt_membership::MemberIdentity;
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! let config = BucketConfig::builder().total_buckets(2).redundant_copies(0).build();
//! let cluster = RegionCluster::new("orders", config, ClearConfig::default());
//! let me = MemberIdentity::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40404);
//! let region = cluster.add_member::<String, u64>(me);
//! region.host_bucket(0).unwrap();
//! region.host_bucket(1).unwrap();
//!
//! region.put("a".to_string(), 1).unwrap();
//! let cleared = region.clear().unwrap();
//! assert_eq!(cleared.len(), 2);
//! assert_eq!(region.local_size(), 0);
//! ```

pub mod config;
pub mod coordinator;
pub mod distribution;
pub mod error;
pub mod event;
pub mod fabric;
pub mod lock;
pub mod message;
pub mod node_set;
pub mod partitioned;
pub mod phase;
pub mod region;
pub mod retry;

pub use config::{ClearConfig, ClearConfigBuilder};
pub use coordinator::{ClearCoordinator, ClearMembershipListener, CLEAR_OPERATION};
pub use distribution::{BroadcastOutcome, ClearMessageHandler, DistributionChannel, ReplyCollector};
pub use error::{ClearError, Result};
pub use event::{FilterInfo, ListenerEvent, RegionEvent};
pub use fabric::{LoopbackChannel, LoopbackFabric};
pub use lock::ClearLock;
pub use message::{ClearMessage, ClearReply, OperationType};
pub use node_set::PersistedNodeSet;
pub use partitioned::{ClientNotification, LocalRegion, PartitionedRegion, RegionCluster, SharedNodeSet};
pub use phase::ClearPhase;
pub use region::{CacheWriter, ClearableRegion, RegionListener};
pub use retry::{RetryTimeKeeper, RetryTimer};
