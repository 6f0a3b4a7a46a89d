//! Error types for skytrack.
//!
//! This module defines all error types used throughout the skytrack crate.
//! The remote-facing taxonomy matters for callers: `NotFound` is
//! informational, `RemoteFailure` is surfaced but does not stop polling,
//! `CredentialMissing` blocks fetches until resolved, and
//! `ValidationFailure` rejects bad input before any network call.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for skytrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Remote-query Errors ===
    /// The queried airport or flight has no records in the window.
    /// Informational, not a failure.
    #[error("no records found: {what}")]
    NotFound {
        /// What was looked for.
        what: String,
    },

    /// A remote call failed: transport error, non-success status, or an
    /// API-reported error payload.
    #[error("remote query failed: {message}")]
    RemoteFailure {
        /// Human-readable description, surfaced to the user.
        message: String,
    },

    /// No API credential is stored. Blocks any fetch until resolved.
    #[error("no API key configured; run `skytrk auth set <key>` or set SKYTRACK_API_KEY")]
    CredentialMissing,

    /// Caller-supplied input rejected before any network call.
    #[error("invalid request: {message}")]
    ValidationFailure {
        /// Description of the validation failure.
        message: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the cache database.
    #[error("failed to open cache database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A cache database query failed.
    #[error("cache query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run cache schema migrations.
    #[error("cache migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for skytrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteFailure {
            message: err.to_string(),
        }
    }
}

impl Error {
    /// Create a not-found result for the given subject.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a remote-failure error with a user-facing message.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteFailure {
            message: message.into(),
        }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means "nothing there", as opposed to a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a missing-credential condition.
    #[must_use]
    pub fn is_credential_missing(&self) -> bool {
        matches!(self, Self::CredentialMissing)
    }
}
