//! Deterministic conflict resolution between an entry and an incoming tag.
//!
//! Every replica runs the same comparison on the same inputs, so updates
//! that arrive in different orders on different members converge without
//! coordination.

use crate::tag::{VersionStamp, VersionTag};
use crate::vector::RegionVersionVector;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::trace;

/// Decision for an incoming versioned operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictOutcome {
    /// The operation is newer and must be applied.
    Apply,
    /// The entry already reflects a newer operation.
    Stale,
    /// The same member sent the same version again.
    Duplicate,
}

impl ConflictOutcome {
    pub fn should_apply(self) -> bool {
        matches!(self, ConflictOutcome::Apply)
    }
}

/// Compare an incoming tag against the stamp an entry currently holds.
///
/// A higher entry version wins. On equal entry versions the higher member
/// identity wins, and a repeat from the same member is a duplicate. An
/// unversioned stamp or tag never blocks an operation.
pub fn check_for_conflict(stamp: &VersionStamp, tag: &VersionTag) -> ConflictOutcome {
    let Some(current) = stamp.member() else {
        return ConflictOutcome::Apply;
    };
    if !tag.has_valid_version() {
        return ConflictOutcome::Apply;
    }

    let outcome = match tag.entry_version().cmp(&stamp.entry_version()) {
        Ordering::Greater => ConflictOutcome::Apply,
        Ordering::Less => ConflictOutcome::Stale,
        Ordering::Equal => match tag.member().cmp(current) {
            Ordering::Greater => ConflictOutcome::Apply,
            Ordering::Less => ConflictOutcome::Stale,
            Ordering::Equal => ConflictOutcome::Duplicate,
        },
    };
    if outcome != ConflictOutcome::Apply {
        trace!(
            tag = %tag,
            entry_version = stamp.entry_version(),
            ?outcome,
            "rejecting versioned operation"
        );
    }
    outcome
}

/// Check a tag for a key that has no entry: reject region versions the
/// vector has already applied.
pub fn check_absent_key(rvv: &RegionVersionVector, tag: &VersionTag) -> ConflictOutcome {
    if rvv.contains_tag(tag) {
        ConflictOutcome::Duplicate
    } else {
        ConflictOutcome::Apply
    }
}
