//! Remote flight-data queries.
//!
//! Two upstream services are consumed: a flight-status API queried by
//! designator (credentialed, `{data, error}` envelope) and a
//! flights-by-airport/track API queried by airport code or aircraft
//! identity (no credential). The [`FlightApi`] trait is the seam the
//! tracker and service poll through, which also makes them testable with
//! a scripted implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::correlate::SearchWindow;
use crate::error::{Error, Result};
use crate::flight::{FlightRecord, FlightTrack, LiveFlightSnapshot};

/// Default flight-status API base URL.
pub const DEFAULT_STATUS_BASE: &str = "https://api.aviationstack.com/v1";

/// Default flights-by-airport / track API base URL.
pub const DEFAULT_AIRPORTS_BASE: &str = "https://opensky-network.org/api";

/// Remote flight-data query operations.
#[async_trait]
pub trait FlightApi: Send + Sync {
    /// Query current snapshots for a flight designator (IATA, e.g. `BA117`).
    ///
    /// An empty collection is a valid outcome; the caller decides whether
    /// that is a not-found condition.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFailure` on transport errors, non-success responses,
    /// or an API-reported error payload.
    async fn flight_status(
        &self,
        designator: &str,
        api_key: &str,
    ) -> Result<Vec<LiveFlightSnapshot>>;

    /// Query departure records for an airport within a validated window.
    ///
    /// A 404 response means "no records", not an error.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFailure` on transport errors or other non-success
    /// responses.
    async fn departures(&self, airport: &str, window: SearchWindow) -> Result<Vec<FlightRecord>>;

    /// Query arrival records for an airport within a validated window.
    ///
    /// A 404 response means "no records", not an error.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFailure` on transport errors or other non-success
    /// responses.
    async fn arrivals(&self, airport: &str, window: SearchWindow) -> Result<Vec<FlightRecord>>;

    /// Query the flown track for an aircraft, given any timestamp within
    /// the flight.
    ///
    /// Returns `None` when no track is available (404), which happens for
    /// flights older than the upstream retention window.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFailure` on transport errors or other non-success
    /// responses.
    async fn track(&self, icao24: &str, at_time: i64) -> Result<Option<FlightTrack>>;
}

/// `{data, error}` envelope wrapping flight-status responses.
#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    #[serde(default)]
    data: Option<Vec<LiveFlightSnapshot>>,
    #[serde(default)]
    error: Option<ApiErrorPayload>,
}

/// Error payload reported inside an otherwise successful response.
#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Unwrap a status envelope into its records.
fn unwrap_envelope(envelope: StatusEnvelope) -> Result<Vec<LiveFlightSnapshot>> {
    if let Some(err) = envelope.error {
        let message = err
            .message
            .or(err.code)
            .unwrap_or_else(|| "API error".to_string());
        return Err(Error::remote(message));
    }
    Ok(envelope.data.unwrap_or_default())
}

/// HTTP implementation of [`FlightApi`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpFlightApi {
    client: reqwest::Client,
    status_base: String,
    airports_base: String,
}

impl HttpFlightApi {
    /// Create a client against the given base URLs with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFailure` if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(
        status_base: impl Into<String>,
        airports_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::remote(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            status_base: status_base.into(),
            airports_base: airports_base.into(),
        })
    }

    /// Create a client against the default public endpoints.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFailure` if the underlying HTTP client cannot be
    /// constructed.
    pub fn with_defaults() -> Result<Self> {
        Self::new(
            DEFAULT_STATUS_BASE,
            DEFAULT_AIRPORTS_BASE,
            Duration::from_secs(30),
        )
    }

    async fn airport_flights(
        &self,
        endpoint: &str,
        airport: &str,
        window: SearchWindow,
    ) -> Result<Vec<FlightRecord>> {
        let url = format!("{}/flights/{endpoint}", self.airports_base);
        debug!(airport, endpoint, "querying flights by airport");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("airport", airport.to_string()),
                ("begin", window.begin().to_string()),
                ("end", window.end().to_string()),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::remote(format!(
                "error fetching {endpoint} flights for {airport}: HTTP {}",
                response.status()
            )));
        }

        let records: Option<Vec<FlightRecord>> = response.json().await?;
        Ok(records.unwrap_or_default())
    }
}

#[async_trait]
impl FlightApi for HttpFlightApi {
    async fn flight_status(
        &self,
        designator: &str,
        api_key: &str,
    ) -> Result<Vec<LiveFlightSnapshot>> {
        let url = format!("{}/flights", self.status_base);
        debug!(designator, "querying flight status");

        let response = self
            .client
            .get(&url)
            .query(&[("access_key", api_key), ("flight_iata", designator)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::remote(format!(
                "failed to fetch flight data: HTTP {}",
                response.status()
            )));
        }

        let envelope: StatusEnvelope = response.json().await?;
        unwrap_envelope(envelope)
    }

    async fn departures(&self, airport: &str, window: SearchWindow) -> Result<Vec<FlightRecord>> {
        self.airport_flights("departure", airport, window).await
    }

    async fn arrivals(&self, airport: &str, window: SearchWindow) -> Result<Vec<FlightRecord>> {
        self.airport_flights("arrival", airport, window).await
    }

    async fn track(&self, icao24: &str, at_time: i64) -> Result<Option<FlightTrack>> {
        let url = format!("{}/tracks/all", self.airports_base);
        debug!(icao24, at_time, "querying flight track");

        let response = self
            .client
            .get(&url)
            .query(&[("icao24", icao24.to_string()), ("time", at_time.to_string())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::remote(format!(
                "error fetching track for {icao24}: HTTP {}",
                response.status()
            )));
        }

        let track: FlightTrack = response.json().await?;
        Ok(Some(track))
    }
}
