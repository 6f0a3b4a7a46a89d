//! Background polling unit for a tracked flight.
//!
//! Each tracking session owns one repeating timer on a dedicated tokio
//! task, polls the flight-status API on every tick, and reports through a
//! channel: change-gated [`TrackerEvent::Update`]s and non-fatal
//! [`TrackerEvent::Error`]s. All session state (designator, credential,
//! last-known snapshot) lives in a per-session struct constructed on
//! `start` and dropped on `stop`, so rapidly switching the tracked flight
//! cannot leak state across sessions.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::FlightApi;
use crate::detect::snapshot_changed;
use crate::flight::{FlightPhase, LiveFlightSnapshot};
use crate::policy::poll_interval;

/// An event emitted by a polling session.
///
/// Events carry the session's designator and generation so a caller that
/// restarted tracking can discard stragglers from a superseded session.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A fetched snapshot passed the change gate.
    Update {
        /// Designator of the session that produced this event.
        designator: String,
        /// Generation of the session that produced this event.
        generation: u64,
        /// The full new snapshot.
        snapshot: LiveFlightSnapshot,
    },
    /// A fetch failed; the timer keeps running.
    Error {
        /// Designator of the session that produced this event.
        designator: String,
        /// Generation of the session that produced this event.
        generation: u64,
        /// Human-readable description of the failure.
        message: String,
    },
}

impl TrackerEvent {
    /// The designator of the session that produced this event.
    #[must_use]
    pub fn designator(&self) -> &str {
        match self {
            Self::Update { designator, .. } | Self::Error { designator, .. } => designator,
        }
    }

    /// The generation of the session that produced this event.
    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::Update { generation, .. } | Self::Error { generation, .. } => *generation,
        }
    }
}

/// State owned by one polling task, dropped wholesale on stop.
struct Session {
    designator: String,
    api_key: String,
    generation: u64,
    last_snapshot: Option<LiveFlightSnapshot>,
    api: Arc<dyn FlightApi>,
    tx: mpsc::Sender<TrackerEvent>,
}

impl Session {
    /// One timer tick: fetch, gate, report.
    ///
    /// Returns `false` when the event receiver is gone and the session
    /// should wind down.
    async fn poll_once(&mut self) -> bool {
        match self.api.flight_status(&self.designator, &self.api_key).await {
            Ok(records) => {
                let Some(next) = records.into_iter().next() else {
                    // Empty result on a later tick is not an error; the
                    // next tick may see the flight again.
                    debug!(designator = %self.designator, "poll returned no records");
                    return true;
                };

                if snapshot_changed(self.last_snapshot.as_ref(), &next) {
                    debug!(designator = %self.designator, "flight data changed");
                    self.last_snapshot = Some(next.clone());
                    self.tx
                        .send(TrackerEvent::Update {
                            designator: self.designator.clone(),
                            generation: self.generation,
                            snapshot: next,
                        })
                        .await
                        .is_ok()
                } else {
                    debug!(designator = %self.designator, "no changes in flight data");
                    true
                }
            }
            Err(e) => {
                warn!(designator = %self.designator, "poll failed: {e}");
                self.tx
                    .send(TrackerEvent::Error {
                        designator: self.designator.clone(),
                        generation: self.generation,
                        message: e.to_string(),
                    })
                    .await
                    .is_ok()
            }
        }
    }
}

/// Handle to the currently armed session, if any.
struct ActiveSession {
    designator: String,
    generation: u64,
    handle: JoinHandle<()>,
}

/// The update scheduler: owns at most one polling session at a time.
///
/// `start` implicitly cancels any prior session, so exactly one timer
/// exists per tracker no matter how often tracking is restarted.
pub struct FlightTracker {
    api: Arc<dyn FlightApi>,
    generation: u64,
    active: Option<ActiveSession>,
}

impl std::fmt::Debug for FlightTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightTracker")
            .field("generation", &self.generation)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FlightTracker {
    /// Create a tracker polling through the given API client.
    #[must_use]
    pub fn new(api: Arc<dyn FlightApi>) -> Self {
        Self {
            api,
            generation: 0,
            active: None,
        }
    }

    /// Start a polling session for `designator`.
    ///
    /// Cancels any existing session first. The interval comes from the
    /// interval policy for `phase`; when the policy yields no interval
    /// (finished flights) no timer is armed and the session is a no-op.
    /// No immediate fetch happens here; the initial fetch is the caller's
    /// responsibility before starting the scheduler.
    ///
    /// Returns the generation of the new session; events from older
    /// generations must be ignored by the caller.
    pub fn start(
        &mut self,
        designator: &str,
        api_key: &str,
        phase: FlightPhase,
        last_snapshot: Option<LiveFlightSnapshot>,
        tx: mpsc::Sender<TrackerEvent>,
    ) -> u64 {
        self.stop();
        self.generation += 1;
        let generation = self.generation;

        let Some(interval) = poll_interval(phase) else {
            info!(designator, %phase, "phase warrants no further polling");
            return generation;
        };

        info!(
            designator,
            %phase,
            interval_mins = interval.as_secs() / 60,
            "starting flight updates"
        );

        let mut session = Session {
            designator: designator.to_string(),
            api_key: api_key.to_string(),
            generation,
            last_snapshot,
            api: Arc::clone(&self.api),
            tx,
        };

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so the first fetch happens one full interval in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !session.poll_once().await {
                    break;
                }
            }
        });

        self.active = Some(ActiveSession {
            designator: designator.to_string(),
            generation,
            handle,
        });
        generation
    }

    /// Stop the current session, discarding all its state.
    ///
    /// Stopping is destructive, not pausable: the session's last-known
    /// snapshot and credential go away with the task.
    pub fn stop(&mut self) {
        if let Some(session) = self.active.take() {
            info!(designator = %session.designator, "stopped flight updates");
            session.handle.abort();
        }
    }

    /// Whether a polling session is currently armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// The designator of the active session, if any.
    #[must_use]
    pub fn active_designator(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.designator.as_str())
    }

    /// The generation of the most recently started session.
    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.active
            .as_ref()
            .map_or(self.generation, |s| s.generation)
    }
}

impl Drop for FlightTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::SearchWindow;
    use crate::error::{Error, Result};
    use crate::flight::{FlightRecord, FlightTrack, LivePosition};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted API: counts fetches and serves snapshots per a mode.
    struct ScriptedApi {
        fetches: AtomicUsize,
        mode: Mode,
    }

    enum Mode {
        /// Every fetch returns a snapshot with a new position.
        Moving,
        /// Every fetch returns the same snapshot.
        Static,
        /// Every fetch returns an empty collection.
        Empty,
        /// Every fetch fails.
        Failing,
    }

    impl ScriptedApi {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                mode,
            })
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn snapshot_at(altitude: f64) -> LiveFlightSnapshot {
            LiveFlightSnapshot {
                status: FlightPhase::Active,
                live: Some(LivePosition {
                    latitude: Some(50.0),
                    longitude: Some(8.0),
                    altitude: Some(altitude),
                    speed_horizontal: Some(850.0),
                    ..LivePosition::default()
                }),
                ..LiveFlightSnapshot::default()
            }
        }
    }

    #[async_trait]
    impl FlightApi for ScriptedApi {
        async fn flight_status(
            &self,
            _designator: &str,
            _api_key: &str,
        ) -> Result<Vec<LiveFlightSnapshot>> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Moving => Ok(vec![Self::snapshot_at(10_000.0 + n as f64 * 100.0)]),
                Mode::Static => Ok(vec![Self::snapshot_at(10_000.0)]),
                Mode::Empty => Ok(Vec::new()),
                Mode::Failing => Err(Error::remote("upstream unavailable")),
            }
        }

        async fn departures(
            &self,
            _airport: &str,
            _window: SearchWindow,
        ) -> Result<Vec<FlightRecord>> {
            Ok(Vec::new())
        }

        async fn arrivals(
            &self,
            _airport: &str,
            _window: SearchWindow,
        ) -> Result<Vec<FlightRecord>> {
            Ok(Vec::new())
        }

        async fn track(&self, _icao24: &str, _at_time: i64) -> Result<Option<FlightTrack>> {
            Ok(None)
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn test_update_emitted_after_one_interval() {
        let api = ScriptedApi::new(Mode::Moving);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, mut rx) = mpsc::channel(16);

        tracker.start("BA117", "key", FlightPhase::Active, None, tx);
        assert!(tracker.is_running());

        let event = tokio::time::timeout(HOUR, rx.recv())
            .await
            .expect("expected an update within the first hour")
            .expect("channel open");

        match event {
            TrackerEvent::Update {
                designator,
                snapshot,
                ..
            } => {
                assert_eq!(designator, "BA117");
                assert!(snapshot.live.is_some());
            }
            TrackerEvent::Error { message, .. } => panic!("unexpected error: {message}"),
        }
        assert_eq!(api.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_immediate_fetch_on_start() {
        let api = ScriptedApi::new(Mode::Moving);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, _rx) = mpsc::channel(16);

        tracker.start("BA117", "key", FlightPhase::Active, None, tx);
        tokio::task::yield_now().await;

        assert_eq!(api.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_leaves_exactly_one_timer() {
        let api = ScriptedApi::new(Mode::Moving);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, mut rx) = mpsc::channel(16);

        let gen1 = tracker.start("BA117", "key", FlightPhase::Active, None, tx.clone());
        let gen2 = tracker.start("BA117", "key", FlightPhase::Active, None, tx);
        assert!(gen2 > gen1);

        // Two updates from a single 15-minute timer means exactly two
        // fetches; a duplicated timer would have produced more.
        for _ in 0..2 {
            let event = tokio::time::timeout(HOUR, rx.recv())
                .await
                .expect("expected updates")
                .expect("channel open");
            assert_eq!(event.generation(), gen2);
        }
        assert_eq!(api.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_snapshot_emits_nothing_but_polling_continues() {
        let api = ScriptedApi::new(Mode::Static);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, mut rx) = mpsc::channel(16);

        // Seed with the same snapshot the API will keep returning.
        tracker.start(
            "BA117",
            "key",
            FlightPhase::Active,
            Some(ScriptedApi::snapshot_at(10_000.0)),
            tx,
        );

        let outcome = tokio::time::timeout(HOUR, rx.recv()).await;
        assert!(outcome.is_err(), "no event should pass the change gate");
        assert!(api.fetch_count() >= 3, "polling must keep going regardless");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_poll_result_is_silent() {
        let api = ScriptedApi::new(Mode::Empty);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, mut rx) = mpsc::channel(16);

        tracker.start("BA117", "key", FlightPhase::Active, None, tx);

        let outcome = tokio::time::timeout(HOUR, rx.recv()).await;
        assert!(outcome.is_err());
        assert!(api.fetch_count() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_reports_and_keeps_timer() {
        let api = ScriptedApi::new(Mode::Failing);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, mut rx) = mpsc::channel(16);

        tracker.start("BA117", "key", FlightPhase::Active, None, tx);

        for _ in 0..2 {
            let event = tokio::time::timeout(HOUR, rx.recv())
                .await
                .expect("expected error events")
                .expect("channel open");
            match event {
                TrackerEvent::Error { message, .. } => {
                    assert!(message.contains("upstream unavailable"));
                }
                TrackerEvent::Update { .. } => panic!("no update expected"),
            }
        }
        assert!(tracker.is_running());
        assert_eq!(api.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_phase_arms_no_timer() {
        let api = ScriptedApi::new(Mode::Moving);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, mut rx) = mpsc::channel(16);

        tracker.start("BA117", "key", FlightPhase::Landed, None, tx);
        assert!(!tracker.is_running());

        // No session holds the sender, so the channel closes with no events.
        let outcome = tokio::time::timeout(HOUR, rx.recv()).await;
        assert!(matches!(outcome, Ok(None)));
        assert_eq!(api.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_polling() {
        let api = ScriptedApi::new(Mode::Moving);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, mut rx) = mpsc::channel(16);

        tracker.start("BA117", "key", FlightPhase::Active, None, tx);
        tracker.stop();
        assert!(!tracker.is_running());
        assert!(tracker.active_designator().is_none());

        // The aborted session drops the sender before any tick fires.
        let outcome = tokio::time::timeout(HOUR, rx.recv()).await;
        assert!(matches!(outcome, Ok(None)));
        assert_eq!(api.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_bumps_generation_for_stale_event_detection() {
        let api = ScriptedApi::new(Mode::Moving);
        let mut tracker = FlightTracker::new(api.clone());
        let (tx, mut rx) = mpsc::channel(16);

        let gen1 = tracker.start("BA117", "key", FlightPhase::Active, None, tx.clone());
        let gen2 = tracker.start("LH2030", "key", FlightPhase::Active, None, tx);
        assert_eq!(tracker.current_generation(), gen2);
        assert_eq!(tracker.active_designator(), Some("LH2030"));

        let event = tokio::time::timeout(HOUR, rx.recv())
            .await
            .expect("expected an update")
            .expect("channel open");
        assert_eq!(event.designator(), "LH2030");
        assert_ne!(event.generation(), gen1);
    }
}
