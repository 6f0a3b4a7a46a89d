//! Polling interval policy.
//!
//! Maps a flight's lifecycle phase to a refresh cadence. Airborne flights
//! change often enough to warrant a short interval, scheduled flights only
//! shift occasionally, and finished flights are never polled again.

use std::time::Duration;

use crate::flight::FlightPhase;

/// Refresh interval for airborne flights.
pub const ACTIVE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Refresh interval for flights that have not departed yet.
pub const SCHEDULED_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// The refresh interval for a flight in the given phase, or `None` when
/// no further polling should be scheduled.
///
/// Total over all phases; an unrecognized status falls into the
/// no-polling bucket as a fail-safe rather than a failure.
#[must_use]
pub fn poll_interval(phase: FlightPhase) -> Option<Duration> {
    match phase {
        FlightPhase::Active => Some(ACTIVE_INTERVAL),
        FlightPhase::Scheduled => Some(SCHEDULED_INTERVAL),
        FlightPhase::Landed
        | FlightPhase::Cancelled
        | FlightPhase::Incident
        | FlightPhase::Diverted
        | FlightPhase::Unknown => None,
    }
}
