//! Core flight types for skytrack.
//!
//! This module defines the data model shared by the correlation engine,
//! the snapshot cache, and the live-update tracker: raw airport movement
//! records, correlated point-to-point flights, and polled live snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a tracked flight.
///
/// Parsed case-insensitively from the status string reported by the
/// flight-data API. Anything unrecognized maps to [`FlightPhase::Unknown`],
/// which the interval policy treats as "stop polling" rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FlightPhase {
    /// Flight has not departed yet.
    Scheduled,
    /// Flight is airborne (reported as `active` or `en-route`).
    Active,
    /// Flight has landed.
    Landed,
    /// Flight was cancelled.
    Cancelled,
    /// Flight had an incident.
    Incident,
    /// Flight was diverted.
    Diverted,
    /// Any status string this crate does not recognize.
    Unknown,
}

impl FlightPhase {
    /// Parse a status string, case-insensitively.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Self::Scheduled,
            "active" | "en-route" => Self::Active,
            "landed" => Self::Landed,
            "cancelled" => Self::Cancelled,
            "incident" => Self::Incident,
            "diverted" => Self::Diverted,
            _ => Self::Unknown,
        }
    }

    /// Whether this phase can still produce new data worth polling for.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Scheduled | Self::Active)
    }
}

impl Default for FlightPhase {
    fn default() -> Self {
        Self::Unknown
    }
}

impl From<String> for FlightPhase {
    fn from(status: String) -> Self {
        Self::parse(&status)
    }
}

impl From<FlightPhase> for String {
    fn from(phase: FlightPhase) -> Self {
        phase.to_string()
    }
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Active => write!(f, "active"),
            Self::Landed => write!(f, "landed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Incident => write!(f, "incident"),
            Self::Diverted => write!(f, "diverted"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One raw airport movement record as returned by the flights-by-airport API.
///
/// Immutable once fetched. Field names follow the upstream JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Transponder-derived aircraft identity. May be missing or empty in
    /// malformed records; an empty identity never matches anything.
    #[serde(default)]
    pub icao24: String,

    /// Callsign as broadcast, if any.
    #[serde(default)]
    pub callsign: Option<String>,

    /// First time the aircraft was seen in this record (epoch seconds).
    #[serde(rename = "firstSeen", default)]
    pub first_seen: i64,

    /// Last time the aircraft was seen in this record (epoch seconds).
    #[serde(rename = "lastSeen", default)]
    pub last_seen: i64,

    /// Estimated departure airport (ICAO code), if known.
    #[serde(rename = "estDepartureAirport", default)]
    pub est_departure_airport: Option<String>,

    /// Estimated arrival airport (ICAO code), if known.
    #[serde(rename = "estArrivalAirport", default)]
    pub est_arrival_airport: Option<String>,
}

/// A synthesized point-to-point flight, produced only by the correlation
/// engine from a validated departure/arrival record pair. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatedFlight {
    /// Aircraft identity shared by both records.
    pub icao24: String,
    /// Callsign from the departure record.
    pub callsign: Option<String>,
    /// Departure time (epoch seconds), from the departure record.
    pub first_seen: i64,
    /// Departure airport, from the departure record.
    pub est_departure_airport: Option<String>,
    /// Arrival time (epoch seconds), from the matched arrival record.
    pub last_seen: i64,
    /// Arrival airport, from the matched arrival record.
    pub est_arrival_airport: String,
}

/// Scheduled, estimated, and actual times for one side of a flight,
/// plus the airport it refers to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleBlock {
    /// Airport display name.
    pub airport: Option<String>,
    /// Airport IATA code.
    pub iata: Option<String>,
    /// Airport ICAO code.
    pub icao: Option<String>,
    /// Scheduled time.
    pub scheduled: Option<DateTime<Utc>>,
    /// Current estimate.
    pub estimated: Option<DateTime<Utc>>,
    /// Actual time, once it happened.
    pub actual: Option<DateTime<Utc>>,
}

impl ScheduleBlock {
    /// Shallow-merge an update into this block: fields present in the
    /// update override, fields absent in the update keep their value.
    pub fn merge_from(&mut self, update: ScheduleBlock) {
        let ScheduleBlock {
            airport,
            iata,
            icao,
            scheduled,
            estimated,
            actual,
        } = update;
        if airport.is_some() {
            self.airport = airport;
        }
        if iata.is_some() {
            self.iata = iata;
        }
        if icao.is_some() {
            self.icao = icao;
        }
        if scheduled.is_some() {
            self.scheduled = scheduled;
        }
        if estimated.is_some() {
            self.estimated = estimated;
        }
        if actual.is_some() {
            self.actual = actual;
        }
    }
}

/// Live position report for an airborne flight. All geo fields are
/// nullable upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivePosition {
    /// When this position was last updated upstream.
    pub updated: Option<DateTime<Utc>>,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Barometric altitude in meters.
    pub altitude: Option<f64>,
    /// Heading in degrees.
    pub direction: Option<f64>,
    /// Ground speed in km/h.
    pub speed_horizontal: Option<f64>,
    /// Vertical speed in km/h.
    pub speed_vertical: Option<f64>,
    /// Whether the aircraft is on the ground.
    pub is_ground: bool,
}

/// Airline and flight-number identification attached to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightIdent {
    /// Flight number without the carrier prefix.
    pub number: Option<String>,
    /// IATA designator, e.g. `BA117`.
    pub iata: Option<String>,
    /// ICAO designator, e.g. `BAW117`.
    pub icao: Option<String>,
}

/// One full point-in-time capture of a tracked flight's schedule and
/// live-position state, as returned by the flight-status API.
///
/// Superseded wholesale on every accepted update; the only sanctioned
/// partial mutation is [`LiveFlightSnapshot::absorb`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveFlightSnapshot {
    /// Calendar date of the flight (as reported, `YYYY-MM-DD`).
    pub flight_date: Option<String>,

    /// Current lifecycle phase.
    #[serde(rename = "flight_status")]
    pub status: FlightPhase,

    /// Departure side of the schedule.
    pub departure: ScheduleBlock,

    /// Arrival side of the schedule.
    pub arrival: ScheduleBlock,

    /// Flight designators.
    pub flight: FlightIdent,

    /// Live position, absent when the flight is not transmitting.
    pub live: Option<LivePosition>,
}

impl LiveFlightSnapshot {
    /// Merge an accepted update into this snapshot.
    ///
    /// Status and the live-position block are replaced wholesale; the
    /// departure and arrival schedule blocks are shallow-merged so a
    /// payload that omits a time does not erase the one already known.
    pub fn absorb(&mut self, update: LiveFlightSnapshot) {
        self.status = update.status;
        self.live = update.live;
        self.departure.merge_from(update.departure);
        self.arrival.merge_from(update.arrival);
        if update.flight_date.is_some() {
            self.flight_date = update.flight_date;
        }
        if update.flight != FlightIdent::default() {
            self.flight = update.flight;
        }
    }
}

/// Raw waypoint tuple as serialized by the track API:
/// `[time, latitude, longitude, baro_altitude, track, on_ground]`.
type RawWaypoint = (i64, Option<f64>, Option<f64>, Option<f64>, Option<f64>, bool);

/// One waypoint of a flown track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWaypoint", into = "RawWaypoint")]
pub struct TrackWaypoint {
    /// Time of the position report (epoch seconds).
    pub time: i64,
    /// Latitude in decimal degrees, if known.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees, if known.
    pub longitude: Option<f64>,
    /// Barometric altitude in meters, if known.
    pub altitude: Option<f64>,
    /// True track in decimal degrees, if known.
    pub track: Option<f64>,
    /// Whether the aircraft was on the ground.
    pub on_ground: bool,
}

impl TrackWaypoint {
    /// Whether this waypoint carries a usable position.
    #[must_use]
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

impl From<RawWaypoint> for TrackWaypoint {
    fn from((time, latitude, longitude, altitude, track, on_ground): RawWaypoint) -> Self {
        Self {
            time,
            latitude,
            longitude,
            altitude,
            track,
            on_ground,
        }
    }
}

impl From<TrackWaypoint> for RawWaypoint {
    fn from(wp: TrackWaypoint) -> Self {
        (
            wp.time,
            wp.latitude,
            wp.longitude,
            wp.altitude,
            wp.track,
            wp.on_ground,
        )
    }
}

/// An ordered flown track for one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightTrack {
    /// Aircraft identity.
    pub icao24: String,
    /// Callsign during the flight, if known.
    #[serde(default)]
    pub callsign: Option<String>,
    /// Start of the track (epoch seconds).
    #[serde(rename = "startTime")]
    pub start_time: i64,
    /// End of the track (epoch seconds).
    #[serde(rename = "endTime")]
    pub end_time: i64,
    /// Ordered waypoints.
    #[serde(default)]
    pub path: Vec<TrackWaypoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_parse_case_insensitive() {
        assert_eq!(FlightPhase::parse("ACTIVE"), FlightPhase::Active);
        assert_eq!(FlightPhase::parse("en-route"), FlightPhase::Active);
        assert_eq!(FlightPhase::parse("Scheduled"), FlightPhase::Scheduled);
        assert_eq!(FlightPhase::parse("landed"), FlightPhase::Landed);
        assert_eq!(FlightPhase::parse("cancelled"), FlightPhase::Cancelled);
    }

    #[test]
    fn test_phase_parse_unrecognized() {
        assert_eq!(FlightPhase::parse(""), FlightPhase::Unknown);
        assert_eq!(FlightPhase::parse("holding"), FlightPhase::Unknown);
    }

    #[test]
    fn test_phase_is_terminal() {
        assert!(!FlightPhase::Scheduled.is_terminal());
        assert!(!FlightPhase::Active.is_terminal());
        assert!(FlightPhase::Landed.is_terminal());
        assert!(FlightPhase::Cancelled.is_terminal());
        assert!(FlightPhase::Unknown.is_terminal());
    }

    #[test]
    fn test_phase_display_round_trip() {
        for phase in [
            FlightPhase::Scheduled,
            FlightPhase::Active,
            FlightPhase::Landed,
            FlightPhase::Cancelled,
            FlightPhase::Incident,
            FlightPhase::Diverted,
        ] {
            assert_eq!(FlightPhase::parse(&phase.to_string()), phase);
        }
    }

    #[test]
    fn test_flight_record_deserialize_upstream_names() {
        let json = r#"{
            "icao24": "3c6444",
            "firstSeen": 1000,
            "estDepartureAirport": "EDDF",
            "lastSeen": 2000,
            "estArrivalAirport": null,
            "callsign": "DLH9U"
        }"#;
        let record: FlightRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.icao24, "3c6444");
        assert_eq!(record.first_seen, 1000);
        assert_eq!(record.last_seen, 2000);
        assert_eq!(record.est_departure_airport.as_deref(), Some("EDDF"));
        assert!(record.est_arrival_airport.is_none());
    }

    #[test]
    fn test_flight_record_missing_identity() {
        let record: FlightRecord =
            serde_json::from_str(r#"{"firstSeen": 1, "lastSeen": 2}"#).unwrap();
        assert!(record.icao24.is_empty());
    }

    #[test]
    fn test_snapshot_deserialize_status_string() {
        let json = r#"{
            "flight_date": "2024-06-01",
            "flight_status": "EN-ROUTE",
            "departure": {"iata": "LHR", "scheduled": "2024-06-01T10:00:00+00:00"},
            "arrival": {"iata": "JFK"},
            "flight": {"iata": "BA117"},
            "live": {"latitude": 51.5, "longitude": -30.0, "altitude": 11000.0,
                     "speed_horizontal": 880.0, "is_ground": false}
        }"#;
        let snapshot: LiveFlightSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.status, FlightPhase::Active);
        assert_eq!(snapshot.departure.iata.as_deref(), Some("LHR"));
        let live = snapshot.live.unwrap();
        assert_eq!(live.latitude, Some(51.5));
        assert!(!live.is_ground);
    }

    #[test]
    fn test_schedule_merge_overrides_present_fields() {
        let mut base = ScheduleBlock {
            airport: Some("Heathrow".to_string()),
            scheduled: Some(Utc::now()),
            estimated: Some(Utc::now()),
            ..ScheduleBlock::default()
        };
        let new_estimate = Utc::now() + chrono::Duration::minutes(20);
        base.merge_from(ScheduleBlock {
            estimated: Some(new_estimate),
            ..ScheduleBlock::default()
        });

        assert_eq!(base.estimated, Some(new_estimate));
        assert_eq!(base.airport.as_deref(), Some("Heathrow"));
        assert!(base.scheduled.is_some());
    }

    #[test]
    fn test_absorb_replaces_status_and_live_wholesale() {
        let mut base = LiveFlightSnapshot {
            status: FlightPhase::Active,
            live: Some(LivePosition {
                latitude: Some(10.0),
                ..LivePosition::default()
            }),
            ..LiveFlightSnapshot::default()
        };
        base.absorb(LiveFlightSnapshot {
            status: FlightPhase::Landed,
            live: None,
            ..LiveFlightSnapshot::default()
        });

        assert_eq!(base.status, FlightPhase::Landed);
        assert!(base.live.is_none());
    }

    #[test]
    fn test_absorb_keeps_schedule_fields_absent_in_update() {
        let scheduled = Utc::now();
        let mut base = LiveFlightSnapshot {
            departure: ScheduleBlock {
                scheduled: Some(scheduled),
                ..ScheduleBlock::default()
            },
            ..LiveFlightSnapshot::default()
        };
        let actual = scheduled + chrono::Duration::minutes(5);
        base.absorb(LiveFlightSnapshot {
            departure: ScheduleBlock {
                actual: Some(actual),
                ..ScheduleBlock::default()
            },
            ..LiveFlightSnapshot::default()
        });

        assert_eq!(base.departure.scheduled, Some(scheduled));
        assert_eq!(base.departure.actual, Some(actual));
    }

    #[test]
    fn test_waypoint_deserialize_from_array() {
        let json = "[1717240000, 51.47, -0.45, 120.5, 271.0, false]";
        let wp: TrackWaypoint = serde_json::from_str(json).unwrap();
        assert_eq!(wp.time, 1_717_240_000);
        assert_eq!(wp.latitude, Some(51.47));
        assert!(wp.has_position());
        assert!(!wp.on_ground);
    }

    #[test]
    fn test_waypoint_null_geo_fields() {
        let json = "[1717240000, null, null, null, null, true]";
        let wp: TrackWaypoint = serde_json::from_str(json).unwrap();
        assert!(!wp.has_position());
        assert!(wp.on_ground);
    }

    #[test]
    fn test_flight_track_deserialize() {
        let json = r#"{
            "icao24": "3c6444",
            "callsign": "DLH9U",
            "startTime": 1717240000,
            "endTime": 1717250000,
            "path": [[1717240000, 50.0, 8.5, null, 90.0, true]]
        }"#;
        let track: FlightTrack = serde_json::from_str(json).unwrap();
        assert_eq!(track.icao24, "3c6444");
        assert_eq!(track.path.len(), 1);
        assert_eq!(track.path[0].longitude, Some(8.5));
    }
}
