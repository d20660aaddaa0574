//! Cache servers that clients connect to, and the locations advertised for
//! each bucket.

use crate::error::ServerError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A server accepting client connections on this member.
pub trait CacheServer: Send + Sync {
    fn is_running(&self) -> bool;

    fn port(&self) -> u16;

    /// The address clients should use to reach this server.
    fn external_address(&self) -> std::result::Result<String, ServerError>;

    fn groups(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Where a client can reach a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketServerLocation {
    pub bucket_id: u32,
    pub host: String,
    pub port: u16,
    pub is_primary: bool,
    /// Metadata version the location was computed for.
    pub version: u32,
    pub groups: Vec<String>,
}

impl fmt::Display for BucketServerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bucket {} at {}:{}{}",
            self.bucket_id,
            self.host,
            self.port,
            if self.is_primary { " (primary)" } else { "" }
        )
    }
}

/// An in-process cache server with a settable address.
pub struct LocalCacheServer {
    port: u16,
    host: RwLock<Option<String>>,
    running: AtomicBool,
    groups: Vec<String>,
}

impl LocalCacheServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        LocalCacheServer {
            port,
            host: RwLock::new(Some(host.into())),
            running: AtomicBool::new(true),
            groups: Vec::new(),
        }
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Drop the bind address while the server still reports running, as a
    /// server does while it is shutting down.
    pub fn lose_bind_address(&self) {
        *self.host.write() = None;
    }
}

impl CacheServer for LocalCacheServer {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn external_address(&self) -> std::result::Result<String, ServerError> {
        self.host
            .read()
            .clone()
            .ok_or_else(|| ServerError::BindAddressNotAvailable(format!("port {}", self.port)))
    }

    fn groups(&self) -> Vec<String> {
        self.groups.clone()
    }
}
