//! SLA deadline computation: a pure function of the policy table and now.

use chrono::{DateTime, Duration, Utc};

use super::types::SlaPolicy;

/// Resolution deadline for a ticket created or re-prioritized at `now`.
/// A priority with no policy row legitimately has no deadline.
pub fn resolution_deadline(
    policy: Option<&SlaPolicy>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    policy.map(|p| now + Duration::hours(i64::from(p.resolution_time_hours)))
}
