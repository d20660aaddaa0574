//! Configuration for entry map operations.

use serde::{Deserialize, Serialize};

/// Per-call operation flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationConfig {
    /// Invoke invalidate callbacks even when an invalidate finds nothing to
    /// invalidate.
    pub force_invalidate_event: bool,

    /// Bulk-load protection: destroys leave a `Destroyed` marker.
    pub in_token_mode: bool,

    /// The region is receiving its initial image.
    pub during_initial_image: bool,

    /// Whether owner callbacks are asked to notify listeners.
    pub invoke_callbacks: bool,
}

impl OperationConfig {
    pub fn builder() -> OperationConfigBuilder {
        OperationConfigBuilder::new()
    }
}

impl Default for OperationConfig {
    fn default() -> Self {
        OperationConfig {
            force_invalidate_event: false,
            in_token_mode: false,
            during_initial_image: false,
            invoke_callbacks: true,
        }
    }
}

/// Builder for [`OperationConfig`].
pub struct OperationConfigBuilder {
    config: OperationConfig,
}

impl OperationConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: OperationConfig::default(),
        }
    }

    pub fn force_invalidate_event(mut self, enabled: bool) -> Self {
        self.config.force_invalidate_event = enabled;
        self
    }

    pub fn in_token_mode(mut self, enabled: bool) -> Self {
        self.config.in_token_mode = enabled;
        self
    }

    pub fn during_initial_image(mut self, enabled: bool) -> Self {
        self.config.during_initial_image = enabled;
        self
    }

    pub fn invoke_callbacks(mut self, enabled: bool) -> Self {
        self.config.invoke_callbacks = enabled;
        self
    }

    pub fn build(self) -> OperationConfig {
        self.config
    }
}

impl Default for OperationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options specific to a destroy.
#[derive(Clone, Debug, PartialEq)]
pub struct DestroyOptions<V> {
    /// The destroy arrives while a register-interest response is applied.
    pub during_ri: bool,
    /// The destroy is issued by region initialization on this member.
    pub from_region_initialization_local: bool,
    /// The destroy is an eviction.
    pub evict: bool,
    /// Only destroy if the current value equals this.
    pub expected_old_value: Option<V>,
    /// Remove an entry recovered from disk without leaving a marker.
    pub remove_recovered_entry: bool,
}

impl<V> Default for DestroyOptions<V> {
    fn default() -> Self {
        DestroyOptions {
            during_ri: false,
            from_region_initialization_local: false,
            evict: false,
            expected_old_value: None,
            remove_recovered_entry: false,
        }
    }
}

impl<V> DestroyOptions<V> {
    pub fn eviction() -> Self {
        DestroyOptions {
            evict: true,
            ..Self::default()
        }
    }

    pub fn expecting(value: V) -> Self {
        DestroyOptions {
            expected_old_value: Some(value),
            ..Self::default()
        }
    }
}

/// Options specific to a put.
#[derive(Clone, Debug, PartialEq)]
pub struct PutOptions<V> {
    /// Only put if the key is absent.
    pub if_new: bool,
    /// Only put if the key is present.
    pub if_old: bool,
    /// Only put if the current value equals this.
    pub expected_old_value: Option<V>,
}

impl<V> Default for PutOptions<V> {
    fn default() -> Self {
        PutOptions {
            if_new: false,
            if_old: false,
            expected_old_value: None,
        }
    }
}

impl<V> PutOptions<V> {
    pub fn if_new() -> Self {
        PutOptions {
            if_new: true,
            ..Self::default()
        }
    }

    pub fn if_old() -> Self {
        PutOptions {
            if_old: true,
            ..Self::default()
        }
    }

    pub fn replacing(value: V) -> Self {
        PutOptions {
            if_old: true,
            expected_old_value: Some(value),
            ..Self::default()
        }
    }
}

/// Tombstone retention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstoneConfig {
    /// How long a tombstone is retained before it may expire.
    pub timeout_ms: u64,
    /// Maximum number of tombstones removed by one expiry pass.
    pub expired_batch_limit: usize,
}

impl Default for TombstoneConfig {
    fn default() -> Self {
        TombstoneConfig {
            timeout_ms: 600_000,
            expired_batch_limit: 100_000,
        }
    }
}

/// How a region stores data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataPolicy {
    /// Holds no data locally; operations pass through.
    Empty,
    Normal,
    Replicate,
    Partition,
}

impl DataPolicy {
    pub fn with_storage(self) -> bool {
        !matches!(self, DataPolicy::Empty)
    }
}

/// Region-level attributes consulted by entry map owners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAttributes {
    pub concurrency_checks_enabled: bool,
    pub data_policy: DataPolicy,
    #[serde(default)]
    pub tombstone: TombstoneConfig,
}

impl Default for RegionAttributes {
    fn default() -> Self {
        RegionAttributes {
            concurrency_checks_enabled: true,
            data_policy: DataPolicy::Partition,
            tombstone: TombstoneConfig::default(),
        }
    }
}

impl RegionAttributes {
    pub fn with_concurrency_checks(mut self, enabled: bool) -> Self {
        self.concurrency_checks_enabled = enabled;
        self
    }

    pub fn with_data_policy(mut self, policy: DataPolicy) -> Self {
        self.data_policy = policy;
        self
    }

    pub fn with_tombstone(mut self, tombstone: TombstoneConfig) -> Self {
        self.tombstone = tombstone;
        self
    }
}
