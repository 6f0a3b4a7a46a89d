//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Departure airport (ICAO code, e.g. EGLL)
    pub from: String,

    /// Arrival airport (ICAO code, e.g. KJFK)
    pub to: String,

    /// Start of the search window (YYYY-MM-DD, defaults to today UTC)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Length of the search window in days (at most 7)
    #[arg(long, default_value = "1")]
    pub days: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Track command arguments.
#[derive(Debug, Args)]
pub struct TrackCommand {
    /// Flight designator (IATA, e.g. BA117)
    pub designator: String,

    /// Keep polling and print updates until interrupted
    #[arg(short = 'F', long)]
    pub follow: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Path command arguments.
#[derive(Debug, Args)]
pub struct PathCommand {
    /// Aircraft transponder address (icao24, e.g. 4010ee)
    pub icao24: String,

    /// Any epoch timestamp within the flight (seconds)
    pub time: i64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Credential management commands.
#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Store the flight-status API key
    Set {
        /// The API key
        key: String,
    },

    /// Show whether a key is stored (masked)
    Show,

    /// Remove the stored API key
    Clear,
}

/// Snapshot cache commands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show cache statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Remove one cached flight
    Remove {
        /// Flight designator to evict
        designator: String,
    },

    /// Remove all cached flights
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_search_command_debug() {
        let cmd = SearchCommand {
            from: "EGLL".to_string(),
            to: "KJFK".to_string(),
            date: None,
            days: 1,
            format: OutputFormat::Table,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("EGLL"));
        assert!(debug_str.contains("KJFK"));
    }

    #[test]
    fn test_track_command_debug() {
        let cmd = TrackCommand {
            designator: "BA117".to_string(),
            follow: true,
            format: OutputFormat::Plain,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("BA117"));
        assert!(debug_str.contains("follow"));
    }

    #[test]
    fn test_auth_command_debug() {
        let cmd = AuthCommand::Show;
        assert!(format!("{cmd:?}").contains("Show"));
    }

    #[test]
    fn test_cache_command_debug() {
        let cmd = CacheCommand::Stats { json: true };
        assert!(format!("{cmd:?}").contains("Stats"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        assert!(format!("{cmd:?}").contains("Show"));
    }

    #[test]
    fn test_output_format_clone() {
        let format = OutputFormat::Table;
        let cloned = format;
        assert_eq!(format, cloned);
    }
}
