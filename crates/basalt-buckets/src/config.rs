//! Bucket configuration.

use basalt_entries::RegionAttributes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Partitioning settings shared by every bucket of a region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Copies kept in addition to the primary.
    pub redundant_copies: u32,
    /// Number of buckets the region is split into.
    pub total_buckets: u32,
    /// Default wait used by callers of `wait_for_primary_member`.
    pub primary_wait_ms: u64,
    /// Attributes of each bucket's entry map.
    #[serde(default)]
    pub attributes: RegionAttributes,
}

impl Default for BucketConfig {
    fn default() -> Self {
        BucketConfig {
            redundant_copies: 1,
            total_buckets: 113,
            primary_wait_ms: 15_000,
            attributes: RegionAttributes::default(),
        }
    }
}

impl BucketConfig {
    pub fn builder() -> BucketConfigBuilder {
        BucketConfigBuilder::default()
    }

    pub fn primary_wait(&self) -> Duration {
        Duration::from_millis(self.primary_wait_ms)
    }
}

/// Builder for [`BucketConfig`].
#[derive(Debug, Default)]
pub struct BucketConfigBuilder {
    config: BucketConfig,
}

impl BucketConfigBuilder {
    pub fn redundant_copies(mut self, copies: u32) -> Self {
        self.config.redundant_copies = copies;
        self
    }

    pub fn total_buckets(mut self, buckets: u32) -> Self {
        self.config.total_buckets = buckets;
        self
    }

    pub fn primary_wait(mut self, wait: Duration) -> Self {
        self.config.primary_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn attributes(mut self, attributes: RegionAttributes) -> Self {
        self.config.attributes = attributes;
        self
    }

    pub fn build(self) -> BucketConfig {
        self.config
    }
}
