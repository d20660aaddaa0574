//! Volunteering strategies.
//!
//! When a hosting member has no primary to defer to, its advisor hands the
//! actual bid for primary to a [`VolunteeringDelegate`] chosen when the
//! advisor is built.

use crate::advisor::BucketAdvisor;
use tracing::debug;

/// Strategy that bids for primary on behalf of an advisor.
///
/// The advisor is in the `Volunteering` state for the duration of the
/// call. A delegate that wins calls [`BucketAdvisor::become_primary`]
/// before returning; otherwise the advisor falls back to waiting for a
/// primary.
pub trait VolunteeringDelegate: Send + Sync {
    fn volunteer_for_primary(&self, advisor: &BucketAdvisor);
}

/// Takes primary immediately if nobody else holds it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateVolunteering;

impl VolunteeringDelegate for ImmediateVolunteering {
    fn volunteer_for_primary(&self, advisor: &BucketAdvisor) {
        if !advisor.become_primary() {
            debug!(bucket = advisor.bucket_id(), "volunteer lost the bid for primary");
        }
    }
}

/// Leaves the bid to someone else; the advisor keeps waiting for a primary.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassiveVolunteering;

impl VolunteeringDelegate for PassiveVolunteering {
    fn volunteer_for_primary(&self, _advisor: &BucketAdvisor) {}
}
