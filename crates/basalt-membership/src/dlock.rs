//! Named cluster-wide locks.
//!
//! [`DistributedLockService`] is the contract consumed by bulk operations
//! that must run one at a time across the whole cluster. [`LockGrantor`] is
//! an in-process grantor shared by simulated members: each member obtains a
//! [`MemberLockService`] handle that locks on its behalf.
//!
//! Locks are held per member, not per thread, and are not reentrant: a
//! member that already holds a lock blocks like any other requester.

use crate::error::{MembershipError, Result};
use crate::member::MemberIdentity;
use crate::view::MembershipListener;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Cluster-wide mutual exclusion by name.
pub trait DistributedLockService: Send + Sync {
    /// Acquire `name`, blocking up to `wait` (`None` waits forever). A
    /// granted lock expires after `lease` (`None` never expires).
    fn lock(&self, name: &str, wait: Option<Duration>, lease: Option<Duration>) -> Result<()>;

    /// Release `name`. Fails if the caller does not hold it.
    fn unlock(&self, name: &str) -> Result<()>;
}

#[derive(Clone, Debug)]
struct Grant {
    holder: MemberIdentity,
    expires_at: Option<Instant>,
}

impl Grant {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Default)]
struct GrantorState {
    grants: Mutex<HashMap<String, Grant>>,
    released: Condvar,
}

/// Grants named locks to members of one simulated cluster.
#[derive(Clone, Default)]
pub struct LockGrantor {
    state: Arc<GrantorState>,
}

impl LockGrantor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lock service that acts on behalf of `member`.
    pub fn handle(&self, member: MemberIdentity) -> MemberLockService {
        MemberLockService {
            grantor: self.clone(),
            member,
        }
    }

    /// Current live holder of `name`, if any.
    pub fn holder(&self, name: &str) -> Option<MemberIdentity> {
        let grants = self.state.grants.lock();
        grants
            .get(name)
            .filter(|grant| !grant.is_expired(Instant::now()))
            .map(|grant| grant.holder.clone())
    }

    /// Release every lock held by `member`. Returns the number released.
    pub fn release_all(&self, member: &MemberIdentity) -> usize {
        let mut grants = self.state.grants.lock();
        let before = grants.len();
        grants.retain(|_, grant| &grant.holder != member);
        let released = before - grants.len();
        if released > 0 {
            self.state.released.notify_all();
        }
        released
    }

    fn acquire(
        &self,
        member: &MemberIdentity,
        name: &str,
        wait: Option<Duration>,
        lease: Option<Duration>,
    ) -> Result<()> {
        let deadline = wait.map(|w| Instant::now() + w);
        let mut grants = self.state.grants.lock();
        loop {
            let now = Instant::now();
            let free = match grants.get(name) {
                None => true,
                Some(grant) if grant.is_expired(now) => {
                    warn!(lock = name, holder = %grant.holder, "lease expired, taking over lock");
                    true
                }
                Some(_) => false,
            };
            if free {
                grants.insert(
                    name.to_string(),
                    Grant {
                        holder: member.clone(),
                        expires_at: lease.map(|l| now + l),
                    },
                );
                debug!(lock = name, member = %member, "lock granted");
                return Ok(());
            }

            trace!(lock = name, member = %member, "waiting for lock");
            // Wake periodically so expired leases are noticed without a release.
            let mut wake_at = grants
                .get(name)
                .and_then(|grant| grant.expires_at)
                .unwrap_or(now + Duration::from_millis(50));
            if let Some(deadline) = deadline {
                if now >= deadline {
                    return Err(MembershipError::LockTimeout {
                        name: name.to_string(),
                    });
                }
                wake_at = wake_at.min(deadline);
            }
            self.state.released.wait_until(&mut grants, wake_at);
        }
    }

    fn release(&self, member: &MemberIdentity, name: &str) -> Result<()> {
        let mut grants = self.state.grants.lock();
        match grants.get(name) {
            Some(grant) if &grant.holder == member => {
                grants.remove(name);
                self.state.released.notify_all();
                debug!(lock = name, member = %member, "lock released");
                Ok(())
            }
            _ => Err(MembershipError::LockNotHeld {
                name: name.to_string(),
                member: member.to_string(),
            }),
        }
    }
}

/// Locks held by a departed member are released so survivors can proceed.
impl MembershipListener for LockGrantor {
    fn member_departed(&self, member: &MemberIdentity, _crashed: bool) {
        let released = self.release_all(member);
        if released > 0 {
            debug!(member = %member, released, "released locks of departed member");
        }
    }
}

/// A member's view of the shared [`LockGrantor`].
#[derive(Clone)]
pub struct MemberLockService {
    grantor: LockGrantor,
    member: MemberIdentity,
}

impl MemberLockService {
    pub fn member(&self) -> &MemberIdentity {
        &self.member
    }
}

impl DistributedLockService for MemberLockService {
    fn lock(&self, name: &str, wait: Option<Duration>, lease: Option<Duration>) -> Result<()> {
        self.grantor.acquire(&self.member, name, wait, lease)
    }

    fn unlock(&self, name: &str) -> Result<()> {
        self.grantor.release(&self.member, name)
    }
}
