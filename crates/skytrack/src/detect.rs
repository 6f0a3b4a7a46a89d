//! Field-level change detection between flight snapshots.
//!
//! Remote responses are frequently byte-different but semantically
//! identical (re-serialized JSON, reordered keys). Comparing the tracked
//! fields directly keeps consumers from waking up, and potentially
//! notifying the user, for a non-change.

use crate::flight::{LiveFlightSnapshot, LivePosition, ScheduleBlock};

/// Decide whether `next` differs from `previous` in any tracked field.
///
/// A first observation (`previous` is `None`) always counts as a change.
/// Tracked fields are the status, the live {latitude, longitude,
/// altitude, horizontal speed} quadruple, and the six schedule times.
/// Absent-vs-present counts as differing. Anything else (callsign text,
/// heading, vertical speed) never triggers a change on its own.
#[must_use]
pub fn snapshot_changed(previous: Option<&LiveFlightSnapshot>, next: &LiveFlightSnapshot) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    if previous.status != next.status {
        return true;
    }

    if position_changed(previous.live.as_ref(), next.live.as_ref()) {
        return true;
    }

    schedule_changed(&previous.departure, &next.departure)
        || schedule_changed(&previous.arrival, &next.arrival)
}

fn position_changed(previous: Option<&LivePosition>, next: Option<&LivePosition>) -> bool {
    match (previous, next) {
        (None, None) => false,
        (Some(prev), Some(next)) => {
            prev.latitude != next.latitude
                || prev.longitude != next.longitude
                || prev.altitude != next.altitude
                || prev.speed_horizontal != next.speed_horizontal
        }
        _ => true,
    }
}

fn schedule_changed(previous: &ScheduleBlock, next: &ScheduleBlock) -> bool {
    previous.scheduled != next.scheduled
        || previous.estimated != next.estimated
        || previous.actual != next.actual
}
