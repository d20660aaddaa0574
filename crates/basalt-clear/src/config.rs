//! Clear configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and retry settings for a distributed clear.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearConfig {
    /// How long to wait for the distributed clear lock. `None` waits forever.
    pub lock_wait_ms: Option<u64>,
    /// Lease of the distributed clear lock. `None` never expires.
    pub lock_lease_ms: Option<u64>,
    /// How long to wait for every local bucket to have a primary.
    pub retry_timeout_ms: u64,
    /// Pause between polls for primaries.
    pub retry_interval_ms: u64,
    /// How long to wait for replies to one clear message.
    pub ack_timeout_ms: u64,
    /// Broadcast attempts before a departed recipient fails the clear.
    pub max_send_attempts: u32,
}

impl Default for ClearConfig {
    fn default() -> Self {
        ClearConfig {
            lock_wait_ms: None,
            lock_lease_ms: None,
            retry_timeout_ms: 120_000,
            retry_interval_ms: 100,
            ack_timeout_ms: 30_000,
            max_send_attempts: 10,
        }
    }
}

impl ClearConfig {
    pub fn builder() -> ClearConfigBuilder {
        ClearConfigBuilder::default()
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn lock_wait(&self) -> Option<Duration> {
        self.lock_wait_ms.map(Duration::from_millis)
    }

    pub fn lock_lease(&self) -> Option<Duration> {
        self.lock_lease_ms.map(Duration::from_millis)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// Builder for [`ClearConfig`].
#[derive(Debug, Default)]
pub struct ClearConfigBuilder {
    config: ClearConfig,
}

impl ClearConfigBuilder {
    pub fn lock_wait(mut self, wait: Option<Duration>) -> Self {
        self.config.lock_wait_ms = wait.map(|w| w.as_millis() as u64);
        self
    }

    pub fn lock_lease(mut self, lease: Option<Duration>) -> Self {
        self.config.lock_lease_ms = lease.map(|l| l.as_millis() as u64);
        self
    }

    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.config.retry_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn max_send_attempts(mut self, attempts: u32) -> Self {
        self.config.max_send_attempts = attempts.max(1);
        self
    }

    pub fn build(self) -> ClearConfig {
        self.config
    }
}
