//! Progress of a clear on the coordinating member.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a clear stands.
///
/// ```text
/// Idle → LockAcquired → Clearing → Unlocked → Done
///                          │
///                          └──▶ PartialFailure
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClearPhase {
    Idle,
    LockAcquired,
    Clearing,
    Unlocked,
    Done,
    PartialFailure,
}

impl ClearPhase {
    /// True if `next` may follow this phase.
    pub fn can_advance_to(self, next: ClearPhase) -> bool {
        use ClearPhase::*;
        matches!(
            (self, next),
            (Idle, LockAcquired)
                | (LockAcquired, Clearing)
                | (LockAcquired, Unlocked)
                | (Clearing, Unlocked)
                | (Clearing, PartialFailure)
                | (Unlocked, Done)
                | (Unlocked, PartialFailure)
                | (Done, Idle)
                | (PartialFailure, Idle)
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, ClearPhase::Done | ClearPhase::PartialFailure)
    }
}

impl fmt::Display for ClearPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClearPhase::Idle => "idle",
            ClearPhase::LockAcquired => "lock-acquired",
            ClearPhase::Clearing => "clearing",
            ClearPhase::Unlocked => "unlocked",
            ClearPhase::Done => "done",
            ClearPhase::PartialFailure => "partial-failure",
        };
        f.write_str(name)
    }
}
