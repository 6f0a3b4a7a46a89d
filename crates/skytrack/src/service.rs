//! Orchestration of tracking sessions.
//!
//! [`TrackingService`] ties the other pieces together: credential check,
//! cache consult, synchronous initial fetch, scheduler start, and the
//! merge of accepted updates back into the session snapshot and cache.
//! One service instance manages at most one tracked flight at a time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::FlightApi;
use crate::cache::{CachedEntry, SnapshotCache};
use crate::correlate::{correlate, SearchWindow};
use crate::error::{Error, Result};
use crate::flight::{CorrelatedFlight, FlightTrack, LiveFlightSnapshot};
use crate::tracker::{FlightTracker, TrackerEvent};

/// Buffered tracker events per session.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Result of starting a tracking session.
#[derive(Debug)]
pub struct TrackStart {
    /// The snapshot the session starts from.
    pub snapshot: LiveFlightSnapshot,
    /// Whether the snapshot was served from the cache without a fetch.
    pub from_cache: bool,
    /// Channel of update and error events from the polling session.
    ///
    /// Stays silent forever when the flight's phase warrants no polling.
    pub events: mpsc::Receiver<TrackerEvent>,
}

/// Outcome of feeding one tracker event through the service.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update passed the session guard and was merged; the new
    /// session snapshot is returned.
    Applied(LiveFlightSnapshot),
    /// A poll failed. Tracking continues on the same timer.
    PollFailed(String),
    /// The event came from a superseded or foreign session and was
    /// discarded.
    Superseded,
}

/// State of the one flight currently being tracked.
struct TrackedSession {
    designator: String,
    generation: u64,
    snapshot: LiveFlightSnapshot,
}

/// Caller-side tracking orchestration.
pub struct TrackingService {
    api: Arc<dyn FlightApi>,
    cache: SnapshotCache,
    tracker: FlightTracker,
    api_key: Option<String>,
    session: Option<TrackedSession>,
}

impl std::fmt::Debug for TrackingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingService")
            .field("tracking", &self.session.as_ref().map(|s| &s.designator))
            .finish_non_exhaustive()
    }
}

impl TrackingService {
    /// Create a service over the given API client, cache, and credential.
    #[must_use]
    pub fn new(api: Arc<dyn FlightApi>, cache: SnapshotCache, api_key: Option<String>) -> Self {
        let tracker = FlightTracker::new(Arc::clone(&api));
        Self {
            api,
            cache,
            tracker,
            api_key,
            session: None,
        }
    }

    /// Start tracking a flight by its IATA designator.
    ///
    /// A fresh cache entry is served without touching the network; a
    /// stale or absent one triggers a synchronous fetch whose result is
    /// written back to the cache. Either way a polling session is started
    /// with the interval appropriate for the flight's phase.
    ///
    /// # Errors
    ///
    /// Returns `CredentialMissing` when no API key is configured,
    /// `NotFound` when the API has no records for the designator, and
    /// `RemoteFailure` on fetch problems.
    pub async fn track(&mut self, designator: &str) -> Result<TrackStart> {
        let api_key = self
            .api_key
            .clone()
            .ok_or(Error::CredentialMissing)?;

        let (snapshot, from_cache) = match self.cache.get(designator)? {
            Some(entry) if entry.is_fresh() => {
                info!(designator, "serving cached snapshot");
                (entry.snapshot, true)
            }
            cached => {
                if cached.is_some() {
                    debug!(designator, "cached snapshot is stale, refetching");
                }
                let snapshot = self.fetch_snapshot(designator, &api_key).await?;
                self.cache.put(designator, &CachedEntry::now(snapshot.clone()))?;
                (snapshot, false)
            }
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let generation = self.tracker.start(
            designator,
            &api_key,
            snapshot.status,
            Some(snapshot.clone()),
            tx,
        );

        self.session = Some(TrackedSession {
            designator: designator.to_string(),
            generation,
            snapshot: snapshot.clone(),
        });

        Ok(TrackStart {
            snapshot,
            from_cache,
            events: rx,
        })
    }

    /// Feed one tracker event through the session guard and merge.
    ///
    /// Events from superseded sessions (wrong designator or generation)
    /// are discarded without side effects. Accepted updates are merged
    /// into the session snapshot and rewritten to the cache.
    ///
    /// # Errors
    ///
    /// Returns an error only when the cache rewrite fails.
    pub fn apply_event(&mut self, event: TrackerEvent) -> Result<UpdateOutcome> {
        let Some(session) = self.session.as_mut() else {
            return Ok(UpdateOutcome::Superseded);
        };
        if event.designator() != session.designator || event.generation() != session.generation {
            debug!(
                designator = event.designator(),
                generation = event.generation(),
                "discarding event from superseded session"
            );
            return Ok(UpdateOutcome::Superseded);
        }

        match event {
            TrackerEvent::Update { snapshot, .. } => {
                session.snapshot.absorb(snapshot);
                let merged = session.snapshot.clone();
                self.cache
                    .put(&session.designator, &CachedEntry::now(merged.clone()))?;
                Ok(UpdateOutcome::Applied(merged))
            }
            TrackerEvent::Error { message, .. } => {
                warn!(designator = %session.designator, "poll failed: {message}");
                Ok(UpdateOutcome::PollFailed(message))
            }
        }
    }

    /// Stop tracking and discard the session.
    pub fn stop(&mut self) {
        self.tracker.stop();
        self.session = None;
    }

    /// The snapshot of the currently tracked flight, if any.
    #[must_use]
    pub fn current_snapshot(&self) -> Option<&LiveFlightSnapshot> {
        self.session.as_ref().map(|s| &s.snapshot)
    }

    /// Search for flights from a departure airport to an arrival airport
    /// within a validated time window.
    ///
    /// Queries departures at `from` and arrivals at `to`, then correlates
    /// the two collections by aircraft identity and timing.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFailure` on fetch problems. An empty result is not
    /// an error.
    pub async fn search_route(
        &self,
        from: &str,
        to: &str,
        window: SearchWindow,
    ) -> Result<Vec<CorrelatedFlight>> {
        let departures = self.api.departures(from, window).await?;
        let arrivals = self.api.arrivals(to, window).await?;
        debug!(
            from,
            to,
            departures = departures.len(),
            arrivals = arrivals.len(),
            "correlating flight records"
        );
        Ok(correlate(&departures, &arrivals, to))
    }

    /// Retrieve the flown track for an aircraft.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no track is available for the aircraft at
    /// that time, and `RemoteFailure` on fetch problems.
    pub async fn flight_path(&self, icao24: &str, at_time: i64) -> Result<FlightTrack> {
        self.api
            .track(icao24, at_time)
            .await?
            .ok_or_else(|| Error::not_found(format!("track for aircraft {icao24}")))
    }

    /// One-shot flight-status lookup, bypassing cache and scheduler.
    ///
    /// # Errors
    ///
    /// Returns `CredentialMissing` when no API key is configured,
    /// `NotFound` when the API has no records, and `RemoteFailure` on
    /// fetch problems.
    pub async fn lookup(&self, designator: &str) -> Result<LiveFlightSnapshot> {
        let api_key = self
            .api_key
            .clone()
            .ok_or(Error::CredentialMissing)?;
        self.fetch_snapshot(designator, &api_key).await
    }

    /// Access the underlying cache.
    #[must_use]
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    async fn fetch_snapshot(&self, designator: &str, api_key: &str) -> Result<LiveFlightSnapshot> {
        let records = self.api.flight_status(designator, api_key).await?;
        records
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("flight {designator}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::{FlightPhase, FlightRecord, LivePosition, ScheduleBlock};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Canned-response API that counts status fetches.
    struct CannedApi {
        status_fetches: AtomicUsize,
        statuses: Mutex<Vec<LiveFlightSnapshot>>,
        departures: Vec<FlightRecord>,
        arrivals: Vec<FlightRecord>,
        track: Option<FlightTrack>,
    }

    impl CannedApi {
        fn with_statuses(statuses: Vec<LiveFlightSnapshot>) -> Arc<Self> {
            Arc::new(Self {
                status_fetches: AtomicUsize::new(0),
                statuses: Mutex::new(statuses),
                departures: Vec::new(),
                arrivals: Vec::new(),
                track: None,
            })
        }

        fn fetch_count(&self) -> usize {
            self.status_fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FlightApi for CannedApi {
        async fn flight_status(
            &self,
            _designator: &str,
            _api_key: &str,
        ) -> Result<Vec<LiveFlightSnapshot>> {
            self.status_fetches.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![statuses.remove(0)])
            }
        }

        async fn departures(
            &self,
            _airport: &str,
            _window: SearchWindow,
        ) -> Result<Vec<FlightRecord>> {
            Ok(self.departures.clone())
        }

        async fn arrivals(
            &self,
            _airport: &str,
            _window: SearchWindow,
        ) -> Result<Vec<FlightRecord>> {
            Ok(self.arrivals.clone())
        }

        async fn track(&self, _icao24: &str, _at_time: i64) -> Result<Option<FlightTrack>> {
            Ok(self.track.clone())
        }
    }

    fn active_snapshot() -> LiveFlightSnapshot {
        LiveFlightSnapshot {
            status: FlightPhase::Active,
            departure: ScheduleBlock {
                iata: Some("LHR".to_string()),
                scheduled: Some("2024-06-01T10:00:00Z".parse().unwrap()),
                ..ScheduleBlock::default()
            },
            live: Some(LivePosition {
                latitude: Some(51.5),
                longitude: Some(-20.0),
                altitude: Some(11_000.0),
                speed_horizontal: Some(880.0),
                ..LivePosition::default()
            }),
            ..LiveFlightSnapshot::default()
        }
    }

    fn service_with(api: Arc<CannedApi>, key: Option<&str>) -> TrackingService {
        let cache = SnapshotCache::open_in_memory(8).unwrap();
        TrackingService::new(api, cache, key.map(String::from))
    }

    #[tokio::test]
    async fn test_track_without_credential_fails_before_any_fetch() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let mut service = service_with(api.clone(), None);

        let err = service.track("BA117").await.unwrap_err();
        assert!(err.is_credential_missing());
        assert_eq!(api.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_track_fetches_and_caches_when_absent() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let mut service = service_with(api.clone(), Some("key"));

        let start = service.track("BA117").await.unwrap();
        assert!(!start.from_cache);
        assert_eq!(start.snapshot.status, FlightPhase::Active);
        assert_eq!(api.fetch_count(), 1);

        let cached = service.cache().get("BA117").unwrap().unwrap();
        assert_eq!(cached.snapshot, start.snapshot);
    }

    #[tokio::test]
    async fn test_track_serves_fresh_cache_without_fetch() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let mut service = service_with(api.clone(), Some("key"));

        service
            .cache()
            .put("BA117", &CachedEntry::now(active_snapshot()))
            .unwrap();

        let start = service.track("BA117").await.unwrap();
        assert!(start.from_cache);
        assert_eq!(api.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_track_refetches_stale_cache_entry() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let mut service = service_with(api.clone(), Some("key"));

        // 20 minutes old for an active flight: past the 15-minute interval.
        let stale = CachedEntry {
            snapshot: active_snapshot(),
            fetched_at: chrono::Utc::now() - chrono::Duration::minutes(20),
        };
        service.cache().put("BA117", &stale).unwrap();

        let start = service.track("BA117").await.unwrap();
        assert!(!start.from_cache);
        assert_eq!(api.fetch_count(), 1);

        let rewritten = service.cache().get("BA117").unwrap().unwrap();
        assert!(rewritten.fetched_at > stale.fetched_at);
    }

    #[tokio::test]
    async fn test_track_unknown_designator_is_not_found() {
        let api = CannedApi::with_statuses(Vec::new());
        let mut service = service_with(api, Some("key"));

        let err = service.track("ZZ000").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(service.current_snapshot().is_none());
    }

    #[tokio::test]
    async fn test_apply_update_merges_and_rewrites_cache() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let mut service = service_with(api, Some("key"));
        service.track("BA117").await.unwrap();
        let generation = service.session.as_ref().unwrap().generation;

        // Update carries a landed status and an arrival actual time, but
        // omits the departure schedule known from before.
        let landed_at: chrono::DateTime<chrono::Utc> = "2024-06-01T18:03:00Z".parse().unwrap();
        let update = LiveFlightSnapshot {
            status: FlightPhase::Landed,
            arrival: ScheduleBlock {
                actual: Some(landed_at),
                ..ScheduleBlock::default()
            },
            ..LiveFlightSnapshot::default()
        };

        let outcome = service
            .apply_event(TrackerEvent::Update {
                designator: "BA117".to_string(),
                generation,
                snapshot: update,
            })
            .unwrap();

        let UpdateOutcome::Applied(merged) = outcome else {
            panic!("expected Applied, got {outcome:?}");
        };
        assert_eq!(merged.status, FlightPhase::Landed);
        // Shallow merge keeps the previously known departure schedule.
        assert_eq!(merged.departure.iata.as_deref(), Some("LHR"));
        assert_eq!(merged.arrival.actual, Some(landed_at));

        let cached = service.cache().get("BA117").unwrap().unwrap();
        assert_eq!(cached.snapshot, merged);
    }

    #[tokio::test]
    async fn test_apply_event_from_superseded_generation_is_discarded() {
        let api = CannedApi::with_statuses(vec![active_snapshot(), active_snapshot()]);
        let mut service = service_with(api, Some("key"));
        service.track("BA117").await.unwrap();
        let old_generation = service.session.as_ref().unwrap().generation;
        service.track("BA117").await.unwrap();

        let before = service.current_snapshot().unwrap().clone();
        let outcome = service
            .apply_event(TrackerEvent::Update {
                designator: "BA117".to_string(),
                generation: old_generation,
                snapshot: LiveFlightSnapshot {
                    status: FlightPhase::Diverted,
                    ..LiveFlightSnapshot::default()
                },
            })
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Superseded);
        assert_eq!(service.current_snapshot().unwrap(), &before);
    }

    #[tokio::test]
    async fn test_apply_event_for_other_designator_is_discarded() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let mut service = service_with(api, Some("key"));
        service.track("BA117").await.unwrap();
        let generation = service.session.as_ref().unwrap().generation;

        let outcome = service
            .apply_event(TrackerEvent::Update {
                designator: "LH2030".to_string(),
                generation,
                snapshot: LiveFlightSnapshot::default(),
            })
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Superseded);
    }

    #[tokio::test]
    async fn test_apply_error_event_reports_poll_failure() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let mut service = service_with(api, Some("key"));
        service.track("BA117").await.unwrap();
        let generation = service.session.as_ref().unwrap().generation;

        let outcome = service
            .apply_event(TrackerEvent::Error {
                designator: "BA117".to_string(),
                generation,
                message: "upstream unavailable".to_string(),
            })
            .unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::PollFailed("upstream unavailable".to_string())
        );
        // The session survives a failed poll.
        assert!(service.current_snapshot().is_some());
    }

    #[tokio::test]
    async fn test_stop_discards_session() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let mut service = service_with(api, Some("key"));
        service.track("BA117").await.unwrap();

        service.stop();
        assert!(service.current_snapshot().is_none());

        let outcome = service
            .apply_event(TrackerEvent::Update {
                designator: "BA117".to_string(),
                generation: 1,
                snapshot: LiveFlightSnapshot::default(),
            })
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Superseded);
    }

    #[tokio::test]
    async fn test_search_route_correlates_both_collections() {
        let window = SearchWindow::new(1_700_000_000, 1_700_003_600).unwrap();
        let departure = FlightRecord {
            icao24: "4010ee".to_string(),
            callsign: Some("BAW117".to_string()),
            first_seen: 1_700_000_100,
            last_seen: 1_700_000_200,
            est_departure_airport: Some("EGLL".to_string()),
            est_arrival_airport: Some("KJFK".to_string()),
        };
        let arrival = FlightRecord {
            icao24: "4010ee".to_string(),
            callsign: Some("BAW117".to_string()),
            first_seen: 1_700_000_100,
            last_seen: 1_700_002_900,
            est_departure_airport: Some("EGLL".to_string()),
            est_arrival_airport: Some("KJFK".to_string()),
        };
        let api = Arc::new(CannedApi {
            status_fetches: AtomicUsize::new(0),
            statuses: Mutex::new(Vec::new()),
            departures: vec![departure],
            arrivals: vec![arrival],
            track: None,
        });
        let service = service_with(api, Some("key"));

        let matches = service.search_route("EGLL", "KJFK", window).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].icao24, "4010ee");
        assert_eq!(matches[0].est_arrival_airport, "KJFK");
    }

    #[tokio::test]
    async fn test_flight_path_missing_track_is_not_found() {
        let api = CannedApi::with_statuses(Vec::new());
        let service = service_with(api, Some("key"));

        let err = service.flight_path("4010ee", 1_700_000_000).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lookup_without_credential() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let service = service_with(api, None);

        let err = service.lookup("BA117").await.unwrap_err();
        assert!(err.is_credential_missing());
    }

    #[tokio::test]
    async fn test_lookup_returns_first_record() {
        let api = CannedApi::with_statuses(vec![active_snapshot()]);
        let service = service_with(api, Some("key"));

        let snapshot = service.lookup("BA117").await.unwrap();
        assert_eq!(snapshot.status, FlightPhase::Active);
    }
}
