//! `SQLite` schema definitions for the snapshot cache.
//!
//! This module contains the SQL statements for creating and managing
//! the cache database schema.

/// SQL statement to create the snapshots table.
///
/// `last_access` is a logical clock (monotonically increasing integer)
/// driving least-recently-used eviction.
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    designator TEXT PRIMARY KEY,
    snapshot TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    last_access INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index on `last_access` for LRU eviction.
pub const CREATE_ACCESS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_snapshots_access ON snapshots(last_access DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_SNAPSHOTS_TABLE,
    CREATE_ACCESS_INDEX,
    CREATE_METADATA_TABLE,
];
