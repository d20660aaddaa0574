//! Primary election and bookkeeping for one bucket.
//!
//! Each member keeps a [`BucketAdvisor`] per bucket of a partitioned
//! region. The advisor tracks which members host the bucket, which one is
//! primary, and drives (re-)election: a hosting member with no primary
//! volunteers through its [`VolunteeringDelegate`], and the departure of the
//! primary triggers a fresh round on a separate thread.
//!
//! ## Primary states
//!
//! ```text
//! NoPrimaryNotHosting ──host──▶ NoPrimaryHosting ──volunteer──▶ Volunteering
//!                                     ▲                             │
//!                                     │ primary departs             │ won
//!                                     │                             ▼
//! OtherPrimaryHosting ◀──other wins── ┴ ───────────────── IsPrimaryHosting
//! ```
//!
//! Any state moves to `Closed` when the bucket is closed, and `Closed` is
//! final.

use crate::delegate::{ImmediateVolunteering, VolunteeringDelegate};
use crate::error::{Result, ServerError};
use crate::region_advisor::RegionAdvisor;
use crate::server::{BucketServerLocation, CacheServer};
use basalt_membership::{MemberIdentity, MembershipListener};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Primary state of a bucket as seen by one member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimaryState {
    NoPrimaryNotHosting,
    NoPrimaryHosting,
    OtherPrimaryNotHosting,
    OtherPrimaryHosting,
    Volunteering,
    IsPrimaryHosting,
    Closed,
}

impl PrimaryState {
    pub fn is_hosting(self) -> bool {
        matches!(
            self,
            PrimaryState::NoPrimaryHosting
                | PrimaryState::OtherPrimaryHosting
                | PrimaryState::Volunteering
                | PrimaryState::IsPrimaryHosting
        )
    }

    pub fn has_primary(self) -> bool {
        matches!(
            self,
            PrimaryState::OtherPrimaryNotHosting
                | PrimaryState::OtherPrimaryHosting
                | PrimaryState::IsPrimaryHosting
        )
    }
}

impl fmt::Display for PrimaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimaryState::NoPrimaryNotHosting => "NO_PRIMARY_NOT_HOSTING",
            PrimaryState::NoPrimaryHosting => "NO_PRIMARY_HOSTING",
            PrimaryState::OtherPrimaryNotHosting => "OTHER_PRIMARY_NOT_HOSTING",
            PrimaryState::OtherPrimaryHosting => "OTHER_PRIMARY_HOSTING",
            PrimaryState::Volunteering => "VOLUNTEERING_HOSTING",
            PrimaryState::IsPrimaryHosting => "IS_PRIMARY_HOSTING",
            PrimaryState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

struct AdvisorState {
    state: PrimaryState,
    hosting: bool,
    primary: Option<MemberIdentity>,
    elector: Option<MemberIdentity>,
    hosting_members: BTreeSet<MemberIdentity>,
}

impl AdvisorState {
    /// Recompute the state from hosting and primary.
    fn settle(&mut self, local: &MemberIdentity) {
        if self.state == PrimaryState::Closed {
            return;
        }
        self.state = match (&self.primary, self.hosting) {
            (Some(primary), true) if primary == local => PrimaryState::IsPrimaryHosting,
            (Some(_), true) => PrimaryState::OtherPrimaryHosting,
            (Some(_), false) => PrimaryState::OtherPrimaryNotHosting,
            (None, true) => PrimaryState::NoPrimaryHosting,
            (None, false) => PrimaryState::NoPrimaryNotHosting,
        };
    }
}

/// Per-bucket primary election and redundancy tracking.
pub struct BucketAdvisor {
    bucket_id: u32,
    local: MemberIdentity,
    region_advisor: Arc<dyn RegionAdvisor>,
    volunteering: Arc<dyn VolunteeringDelegate>,
    state: Mutex<AdvisorState>,
    primary_changed: Condvar,
    initialized: AtomicBool,
    shadow_buckets: Mutex<HashMap<String, bool>>,
    servers: RwLock<Vec<Arc<dyn CacheServer>>>,
    me: Weak<BucketAdvisor>,
}

impl BucketAdvisor {
    /// Create an advisor for `bucket_id` on the member `local`.
    pub fn new(
        bucket_id: u32,
        local: MemberIdentity,
        region_advisor: Arc<dyn RegionAdvisor>,
        volunteering: Arc<dyn VolunteeringDelegate>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| BucketAdvisor {
            bucket_id,
            local,
            region_advisor,
            volunteering,
            state: Mutex::new(AdvisorState {
                state: PrimaryState::NoPrimaryNotHosting,
                hosting: false,
                primary: None,
                elector: None,
                hosting_members: BTreeSet::new(),
            }),
            primary_changed: Condvar::new(),
            initialized: AtomicBool::new(false),
            shadow_buckets: Mutex::new(HashMap::new()),
            servers: RwLock::new(Vec::new()),
            me: me.clone(),
        })
    }

    /// Create an advisor that takes primary as soon as it volunteers.
    pub fn with_immediate_volunteering(
        bucket_id: u32,
        local: MemberIdentity,
        region_advisor: Arc<dyn RegionAdvisor>,
    ) -> Arc<Self> {
        Self::new(bucket_id, local, region_advisor, Arc::new(ImmediateVolunteering))
    }

    pub fn bucket_id(&self) -> u32 {
        self.bucket_id
    }

    pub fn local_member(&self) -> &MemberIdentity {
        &self.local
    }

    pub fn region_path(&self) -> &str {
        self.region_advisor.region_path()
    }

    // ---- initialization ----

    /// True once the bucket finished initializing and may volunteer.
    pub fn initialization_gate(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn open_initialization_gate(&self) {
        self.initialized.store(true, Ordering::Release);
        trace!(bucket = self.bucket_id, "initialization gate opened");
    }

    /// Record the member expected to assign the initial primary. An elector
    /// that does not host the region any more is ignored.
    pub fn initialize_primary_elector(&self, elector: Option<MemberIdentity>) {
        let elector = elector.filter(|e| self.region_advisor.has_partitioned_region(e));
        debug!(bucket = self.bucket_id, elector = ?elector, "primary elector initialized");
        self.state.lock().elector = elector;
    }

    pub fn primary_elector(&self) -> Option<MemberIdentity> {
        self.state.lock().elector.clone()
    }

    // ---- hosting ----

    /// Start or stop hosting the bucket on this member. A primary that
    /// stops hosting gives up primary.
    pub fn set_hosting(&self, hosting: bool) {
        let mut st = self.state.lock();
        if st.state == PrimaryState::Closed {
            return;
        }
        st.hosting = hosting;
        if hosting {
            st.hosting_members.insert(self.local.clone());
        } else {
            st.hosting_members.remove(&self.local);
            if st.primary.as_ref() == Some(&self.local) {
                st.primary = None;
                info!(bucket = self.bucket_id, "primary stopped hosting bucket");
            }
        }
        st.settle(&self.local);
        self.primary_changed.notify_all();
    }

    pub fn is_hosting(&self) -> bool {
        self.state.lock().hosting
    }

    pub fn add_hosting_member(&self, member: MemberIdentity) -> bool {
        self.state.lock().hosting_members.insert(member)
    }

    pub fn remove_hosting_member(&self, member: &MemberIdentity) -> bool {
        self.state.lock().hosting_members.remove(member)
    }

    pub fn hosting_members(&self) -> Vec<MemberIdentity> {
        self.state.lock().hosting_members.iter().cloned().collect()
    }

    // ---- primary ----

    pub fn primary_state(&self) -> PrimaryState {
        self.state.lock().state
    }

    pub fn is_primary(&self) -> bool {
        self.state.lock().state == PrimaryState::IsPrimaryHosting
    }

    pub fn has_primary(&self) -> bool {
        self.state.lock().primary.is_some()
    }

    pub fn primary_member(&self) -> Option<MemberIdentity> {
        self.state.lock().primary.clone()
    }

    /// Offer this member as primary.
    ///
    /// Nothing happens before the initialization gate opens, while a live
    /// elector is expected to assign the primary, or when this member does
    /// not host the bucket or a primary already exists. An elector that
    /// departed since [`initialize_primary_elector`] is cleared and this
    /// member volunteers anyway.
    ///
    /// Returns true if the volunteering delegate was invoked.
    ///
    /// [`initialize_primary_elector`]: BucketAdvisor::initialize_primary_elector
    pub fn volunteer_for_primary(&self) -> bool {
        if !self.initialization_gate() {
            trace!(bucket = self.bucket_id, "not volunteering before initialization");
            return false;
        }

        if let Some(elector) = self.primary_elector() {
            if elector != self.local {
                if self.region_advisor.has_partitioned_region(&elector) {
                    debug!(bucket = self.bucket_id, elector = %elector, "waiting for elector to assign primary");
                    return false;
                }
                info!(bucket = self.bucket_id, elector = %elector, "primary elector is gone, volunteering");
            }
            let mut st = self.state.lock();
            if st.elector.as_ref() == Some(&elector) {
                st.elector = None;
            }
        }

        {
            let mut st = self.state.lock();
            if !st.hosting || st.primary.is_some() {
                return false;
            }
            if matches!(st.state, PrimaryState::Volunteering | PrimaryState::Closed) {
                return false;
            }
            st.state = PrimaryState::Volunteering;
        }
        debug!(bucket = self.bucket_id, member = %self.local, "volunteering for primary");

        self.volunteering.volunteer_for_primary(self);

        let mut st = self.state.lock();
        if st.state == PrimaryState::Volunteering {
            st.settle(&self.local);
        }
        true
    }

    /// Make this member primary. Fails if it does not host the bucket, the
    /// bucket is closed or another member is primary.
    pub fn become_primary(&self) -> bool {
        let mut st = self.state.lock();
        if st.state == PrimaryState::Closed || !st.hosting {
            return false;
        }
        match &st.primary {
            Some(primary) if primary == &self.local => return true,
            Some(_) => return false,
            None => {}
        }
        st.primary = Some(self.local.clone());
        st.settle(&self.local);
        self.primary_changed.notify_all();
        info!(bucket = self.bucket_id, member = %self.local, "became primary");
        true
    }

    /// Give up primary. Returns false if this member was not primary.
    pub fn resign_primary(&self) -> bool {
        let mut st = self.state.lock();
        if st.primary.as_ref() != Some(&self.local) {
            return false;
        }
        st.primary = None;
        st.settle(&self.local);
        self.primary_changed.notify_all();
        info!(bucket = self.bucket_id, "resigned primary");
        true
    }

    /// Apply a primary change announced by another member.
    pub fn set_primary_member(&self, primary: Option<MemberIdentity>) {
        let mut st = self.state.lock();
        if st.state == PrimaryState::Closed {
            return;
        }
        let was_primary = st.state == PrimaryState::IsPrimaryHosting;
        if let Some(member) = &primary {
            st.hosting_members.insert(member.clone());
        }
        st.primary = primary;
        st.settle(&self.local);
        self.primary_changed.notify_all();
        if was_primary && st.state != PrimaryState::IsPrimaryHosting {
            info!(bucket = self.bucket_id, primary = ?st.primary, "lost primary");
        }
    }

    /// Block until some member is primary or `timeout` elapses.
    pub fn wait_for_primary_member(&self, timeout: Duration) -> Option<MemberIdentity> {
        let deadline = Instant::now() + timeout;
        let mut st = self.state.lock();
        loop {
            if let Some(primary) = &st.primary {
                return Some(primary.clone());
            }
            if st.state == PrimaryState::Closed {
                return None;
            }
            if self.primary_changed.wait_until(&mut st, deadline).timed_out() {
                return st.primary.clone();
            }
        }
    }

    // ---- redundancy ----

    /// Copies beyond the first, or -1 when no member hosts the bucket.
    pub fn bucket_redundancy(&self) -> i32 {
        self.state.lock().hosting_members.len() as i32 - 1
    }

    pub fn redundant_copies(&self) -> u32 {
        self.region_advisor.redundant_copies()
    }

    pub fn is_redundancy_satisfied(&self) -> bool {
        self.bucket_redundancy() >= self.redundant_copies() as i32
    }

    // ---- shadow buckets ----

    pub fn mark_shadow_bucket_as_destroyed(&self, path: &str) {
        self.shadow_buckets.lock().insert(path.to_string(), true);
    }

    /// False for paths never marked.
    pub fn is_shadow_bucket_destroyed(&self, path: &str) -> bool {
        self.shadow_buckets.lock().get(path).copied().unwrap_or(false)
    }

    pub fn mark_all_shadow_buckets_as_destroyed(&self) {
        self.shadow_buckets.lock().values_mut().for_each(|d| *d = true);
    }

    pub fn mark_all_shadow_buckets_as_not_destroyed(&self) {
        self.shadow_buckets.lock().values_mut().for_each(|d| *d = false);
    }

    // ---- server locations ----

    pub fn add_cache_server(&self, server: Arc<dyn CacheServer>) {
        self.servers.write().push(server);
    }

    /// Locations of the running cache servers through which clients reach
    /// this bucket. A server whose bind address went away after it was
    /// seen running is left out; any other server error is returned.
    pub fn bucket_server_locations(&self, version: u32) -> Result<Vec<BucketServerLocation>> {
        let is_primary = self.is_primary();
        let servers: Vec<_> = self.servers.read().clone();
        let mut locations = Vec::with_capacity(servers.len());
        for server in servers {
            if !server.is_running() {
                continue;
            }
            match server.external_address() {
                Ok(host) => locations.push(BucketServerLocation {
                    bucket_id: self.bucket_id,
                    host,
                    port: server.port(),
                    is_primary,
                    version,
                    groups: server.groups(),
                }),
                Err(ServerError::BindAddressNotAvailable(reason)) => {
                    debug!(bucket = self.bucket_id, %reason, "skipping server without bind address");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(locations)
    }

    // ---- lifecycle ----

    pub fn close(&self) {
        let mut st = self.state.lock();
        st.state = PrimaryState::Closed;
        st.hosting = false;
        if st.primary.as_ref() == Some(&self.local) {
            st.primary = None;
        }
        self.primary_changed.notify_all();
        debug!(bucket = self.bucket_id, "bucket advisor closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().state == PrimaryState::Closed
    }

    fn spawn_reelection(&self) {
        let Some(advisor) = self.me.upgrade() else {
            return;
        };
        let bucket = self.bucket_id;
        let spawned = thread::Builder::new()
            .name(format!("bucket-{}-volunteer", bucket))
            .spawn(move || {
                advisor.volunteer_for_primary();
            });
        if let Err(err) = spawned {
            warn!(bucket, %err, "could not start primary re-election");
        }
    }
}

impl MembershipListener for BucketAdvisor {
    fn member_departed(&self, member: &MemberIdentity, crashed: bool) {
        let reelect = {
            let mut st = self.state.lock();
            if st.state == PrimaryState::Closed {
                return;
            }
            st.hosting_members.remove(member);
            if st.elector.as_ref() == Some(member) {
                st.elector = None;
                info!(bucket = self.bucket_id, elector = %member, "primary elector departed");
            }
            if st.primary.as_ref() == Some(member) {
                st.primary = None;
                st.settle(&self.local);
                self.primary_changed.notify_all();
                info!(bucket = self.bucket_id, primary = %member, crashed, "primary departed");
                st.hosting
            } else {
                false
            }
        };
        if reelect {
            self.spawn_reelection();
        }
    }
}

impl fmt::Debug for BucketAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.lock();
        f.debug_struct("BucketAdvisor")
            .field("bucket_id", &self.bucket_id)
            .field("local", &self.local)
            .field("state", &st.state)
            .field("primary", &st.primary)
            .field("hosting_members", &st.hosting_members.len())
            .finish()
    }
}
