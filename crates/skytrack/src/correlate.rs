//! Correlation of independently-fetched departure and arrival records.
//!
//! The flights-by-airport API returns departures and arrivals as separate,
//! unordered collections with no leg identifier. Pairing them back into
//! point-to-point flights is done by aircraft identity plus two guards: the
//! departure must not be explicitly bound elsewhere, and the arrival must be
//! temporally after the departure. Tail-number reuse across unrelated legs
//! on the same day makes both guards necessary.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::flight::{CorrelatedFlight, FlightRecord};

/// Maximum span of a search window, in seconds.
pub const MAX_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

/// A validated epoch-seconds time window for flights-by-airport queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    begin: i64,
    end: i64,
}

impl SearchWindow {
    /// Validate and construct a window from epoch-second bounds.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailure` when `begin > end` or the span exceeds
    /// seven days. Rejected before any network call.
    pub fn new(begin: i64, end: i64) -> Result<Self> {
        if begin > end {
            return Err(Error::validation(
                "begin date must be before or same as end date",
            ));
        }
        if end - begin > MAX_WINDOW_SECS {
            return Err(Error::validation("the date range cannot exceed 7 days"));
        }
        Ok(Self { begin, end })
    }

    /// Validate and construct a window from calendar timestamps.
    ///
    /// # Errors
    ///
    /// Same conditions as [`SearchWindow::new`].
    pub fn from_dates(begin: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        Self::new(begin.timestamp(), end.timestamp())
    }

    /// Window start (epoch seconds).
    #[must_use]
    pub fn begin(&self) -> i64 {
        self.begin
    }

    /// Window end (epoch seconds).
    #[must_use]
    pub fn end(&self) -> i64 {
        self.end
    }
}

/// Pair departure records with arrival records for flights that landed at
/// `target_arrival_airport`.
///
/// Per departure record:
/// 1. A departure explicitly bound for a different airport is discarded,
///    even if the same aircraft later lands at the target.
/// 2. Otherwise the first arrival (in input order) with the same non-empty
///    identity, the target as its arrival airport, and `last_seen` strictly
///    after the departure's `first_seen` is taken.
/// 3. The emitted flight carries the departure side from the departure
///    record and the arrival side from the matched arrival record, which is
///    authoritative for the target airport.
///
/// Absence of a match is a silent, expected outcome. Deterministic over
/// unmodified inputs; the first-match tie-break follows arrival input
/// order deliberately, with no ranking by time delta.
#[must_use]
pub fn correlate(
    departures: &[FlightRecord],
    arrivals: &[FlightRecord],
    target_arrival_airport: &str,
) -> Vec<CorrelatedFlight> {
    let mut matched = Vec::new();

    for departure in departures {
        if let Some(est) = &departure.est_arrival_airport {
            if est != target_arrival_airport {
                continue;
            }
        }

        let arrival = arrivals.iter().find(|arrival| {
            !departure.icao24.is_empty()
                && arrival.icao24 == departure.icao24
                && arrival.est_arrival_airport.as_deref() == Some(target_arrival_airport)
                && arrival.last_seen > departure.first_seen
        });

        if let Some(arrival) = arrival {
            matched.push(CorrelatedFlight {
                icao24: departure.icao24.clone(),
                callsign: departure.callsign.clone(),
                first_seen: departure.first_seen,
                est_departure_airport: departure.est_departure_airport.clone(),
                last_seen: arrival.last_seen,
                est_arrival_airport: target_arrival_airport.to_string(),
            });
        }
    }

    matched
}
