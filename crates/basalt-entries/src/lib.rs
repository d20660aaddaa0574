//! # basalt-entries
//!
//! The per-key entry map at the heart of a Basalt region.
//!
//! Every key holds a [`RegionEntry`] whose payload is a value or one of the
//! [`Token`] markers. The [`EntryMap`] applies invalidate, destroy and put
//! operations to single keys with versioned conflict resolution, leaves
//! tombstones behind versioned destroys and collects them later.
//!
//! The region that owns a map supplies a [`RegionOwner`]: the map tells the
//! owner what happened through callback hooks and asks it for region-wide
//! facts such as the version vector.
//!
//! ## Example
//!
//! ```rust,ignore
//! use basalt_entries::{EntryEvent, EntryMap, OperationConfig, PutOptions};
//!
//! let map: EntryMap<String, String> = EntryMap::default();
//! let mut event = EntryEvent::put("k".to_string(), "v".to_string());
//! map.put(&owner, &mut event, &PutOptions::default(), &OperationConfig::default())?;
//! assert_eq!(map.get(&"k".to_string()), Some("v".to_string()));
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod eviction;
pub mod map;
pub mod owner;
pub mod token;
mod tombstone;

pub use config::{
    DataPolicy, DestroyOptions, OperationConfig, OperationConfigBuilder, PutOptions,
    RegionAttributes, TombstoneConfig,
};
pub use entry::{RegionEntry, RegionId};
pub use error::{EntryError, Result};
pub use event::{EntryEvent, EventId, Operation, TxId};
pub use eviction::{EvictableEntryMap, EvictionController, LruEntryController, LruEntryMap};
pub use map::EntryMap;
pub use owner::{CachePerfSnapshot, CachePerfStats, RegionOwner};
pub use token::{Token, TokenKind};
