//! `skytrack` - Follow flights from the command line
//!
//! This library provides the core functionality for searching real routes
//! between airports, following live flights with phase-adaptive polling,
//! and retrieving flown tracks, backed by a bounded local snapshot cache.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod correlate;
pub mod credentials;
pub mod detect;
pub mod error;
pub mod flight;
pub mod logging;
pub mod policy;
pub mod service;
pub mod tracker;

pub use api::{FlightApi, HttpFlightApi};
pub use cache::{CachedEntry, SnapshotCache};
pub use config::Config;
pub use error::{Error, Result};
pub use flight::{FlightPhase, LiveFlightSnapshot};
pub use logging::init_logging;
pub use service::TrackingService;
