//! Snapshot cache for tracked flights.
//!
//! This module provides `SQLite`-based persistence of the last-known
//! snapshot per flight designator, plus the fetch timestamp needed to
//! judge staleness against the interval policy. The cache is bounded: a
//! fixed number of designators is retained with least-recently-used
//! eviction, so casual tracking of many flights does not accumulate
//! forever.
//!
//! Only one polling unit runs per designator at a time, so last-writer-wins
//! is a sufficient write discipline.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::flight::LiveFlightSnapshot;
use crate::policy::poll_interval;

/// Default number of designators retained before LRU eviction kicks in.
pub const DEFAULT_CAPACITY: usize = 32;

/// The last-known snapshot for a flight designator plus when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    /// The cached snapshot.
    pub snapshot: LiveFlightSnapshot,
    /// When the snapshot was fetched from the remote API.
    pub fetched_at: DateTime<Utc>,
}

impl CachedEntry {
    /// Wrap a freshly fetched snapshot with the current time.
    #[must_use]
    pub fn now(snapshot: LiveFlightSnapshot) -> Self {
        Self {
            snapshot,
            fetched_at: Utc::now(),
        }
    }

    /// Whether this entry is still fresh at `now`.
    ///
    /// Fresh means younger than the interval policy's refresh interval for
    /// the snapshot's phase. Phases with no polling interval (landed,
    /// cancelled, unknown) never go stale; re-fetching a finished flight
    /// buys nothing.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match poll_interval(self.snapshot.status) {
            Some(interval) => {
                let age = now.signed_duration_since(self.fetched_at);
                age < chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero())
            }
            None => true,
        }
    }

    /// Whether this entry is fresh right now.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// Bounded, persistent snapshot cache keyed by flight designator.
#[derive(Debug)]
pub struct SnapshotCache {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Maximum number of designators retained.
    max_entries: usize,
}

impl SnapshotCache {
    /// Open or create a cache database at the given path.
    ///
    /// Creates the parent directories and database file if they don't
    /// exist, and initializes the schema on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening snapshot cache at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL keeps reads cheap while the polling task writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Snapshot cache opened at {}", path.display());
        Ok(Self {
            path,
            conn,
            max_entries,
        })
    }

    /// Create an in-memory cache instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(max_entries: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            max_entries,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Write the entry for a designator, overwriting any previous one in
    /// place, then evict least-recently-used designators beyond capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put(&self, designator: &str, entry: &CachedEntry) -> Result<()> {
        let snapshot_json = serde_json::to_string(&entry.snapshot)?;
        let fetched_at = entry.fetched_at.to_rfc3339();
        let access = self.next_access()?;

        self.conn.execute(
            r"
            INSERT INTO snapshots (designator, snapshot, fetched_at, last_access)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(designator) DO UPDATE SET
                snapshot = excluded.snapshot,
                fetched_at = excluded.fetched_at,
                last_access = excluded.last_access
            ",
            params![designator, snapshot_json, fetched_at, access],
        )?;
        debug!("Cached snapshot for {}", designator);

        self.evict_beyond_capacity()?;
        Ok(())
    }

    /// Read the entry for a designator, marking it most recently used.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the stored
    /// snapshot no longer deserializes.
    pub fn get(&self, designator: &str) -> Result<Option<CachedEntry>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT snapshot, fetched_at FROM snapshots WHERE designator = ?1",
                [designator],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((snapshot_json, fetched_at_str)) = row else {
            return Ok(None);
        };

        let access = self.next_access()?;
        self.conn.execute(
            "UPDATE snapshots SET last_access = ?1 WHERE designator = ?2",
            params![access, designator],
        )?;

        let snapshot: LiveFlightSnapshot = serde_json::from_str(&snapshot_json)?;
        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at_str)
            .map_err(|e| Error::internal(format!("corrupt fetched_at in cache: {e}")))?
            .with_timezone(&Utc);

        Ok(Some(CachedEntry {
            snapshot,
            fetched_at,
        }))
    }

    /// Remove the entry for a designator.
    ///
    /// Returns `true` if an entry was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, designator: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM snapshots WHERE designator = ?1", [designator])?;
        Ok(affected > 0)
    }

    /// Remove all entries. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let affected = self.conn.execute("DELETE FROM snapshots", [])?;
        if affected > 0 {
            info!("Cleared {} cached snapshots", affected);
        }
        Ok(affected)
    }

    /// Count cached designators.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get cache statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<CacheStats> {
        let entries = self.count()?;

        let oldest: Option<String> = self
            .conn
            .query_row(
                "SELECT fetched_at FROM snapshots ORDER BY fetched_at ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT fetched_at FROM snapshots ORDER BY fetched_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let oldest_fetch = oldest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let newest_fetch = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(CacheStats {
            entries,
            capacity: self.max_entries,
            oldest_fetch,
            newest_fetch,
            db_size_bytes,
        })
    }

    /// Next value of the logical access clock.
    fn next_access(&self) -> Result<i64> {
        let max: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(last_access), 0) FROM snapshots",
            [],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    /// Delete least-recently-used designators beyond capacity.
    fn evict_beyond_capacity(&self) -> Result<usize> {
        let keep = i64::try_from(self.max_entries.max(1)).unwrap_or(i64::MAX);
        let affected = self.conn.execute(
            r"
            DELETE FROM snapshots WHERE designator NOT IN (
                SELECT designator FROM snapshots ORDER BY last_access DESC LIMIT ?1
            )
            ",
            [keep],
        )?;

        if affected > 0 {
            debug!("Evicted {} least-recently-used cache entries", affected);
        }
        Ok(affected)
    }
}

/// Statistics about the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached designators.
    pub entries: i64,
    /// Configured capacity.
    pub capacity: usize,
    /// Fetch time of the oldest entry.
    pub oldest_fetch: Option<DateTime<Utc>>,
    /// Fetch time of the newest entry.
    pub newest_fetch: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
