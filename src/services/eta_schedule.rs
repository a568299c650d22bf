//! ETA computation for a sequenced route.
//!
//! Given the legs of the finalized open path (depot → first stop → ... →
//! last stop), this walks the route and accumulates travel time plus a fixed
//! service time at every stop but the last. It does NOT re-optimise the
//! order and never looks at the cost matrix; the legs are the source of truth.

use chrono::{DateTime, Duration, Utc};

use crate::services::routing::RouteLeg;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Leg travel time; fractional seconds kept at millisecond precision,
/// negative or non-finite values treated as zero, oversized values saturated.
fn leg_duration(leg: &RouteLeg) -> Duration {
    if !leg.duration_sec.is_finite() || leg.duration_sec <= 0.0 {
        return Duration::zero();
    }
    let millis = (leg.duration_sec * 1000.0).round();
    if millis >= i64::MAX as f64 {
        return Duration::MAX;
    }
    Duration::try_milliseconds(millis as i64).unwrap_or(Duration::MAX)
}

/// Advance `time` by `by`, pinning at the latest representable instant.
fn advance(time: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    time.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Compute one arrival timestamp per leg.
///
/// `service` is spent at each stop before departing for the next one; no
/// service time is added after the final leg.
pub fn compute_etas(
    legs: &[RouteLeg],
    start_time: DateTime<Utc>,
    service: Duration,
) -> Vec<DateTime<Utc>> {
    let service = service.max(Duration::zero());
    let mut etas = Vec::with_capacity(legs.len());
    let mut cursor = start_time;

    for (i, leg) in legs.iter().enumerate() {
        cursor = advance(cursor, leg_duration(leg));
        etas.push(cursor);

        if i + 1 < legs.len() {
            cursor = advance(cursor, service);
        }
    }

    etas
}

// ===========================================================================
// Tests
// ===========================================================================
