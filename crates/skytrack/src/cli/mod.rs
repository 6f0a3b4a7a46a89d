//! Command-line interface for skytrack.
//!
//! This module provides the CLI structure and command handlers for the
//! `skytrk` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AuthCommand, CacheCommand, ConfigCommand, OutputFormat, PathCommand, SearchCommand,
    TrackCommand,
};

/// skytrk - Follow flights from the command line
///
/// Searches real routes between airports, follows live flights with
/// adaptive polling, and retrieves flown tracks, with a local snapshot
/// cache to keep remote queries to a minimum.
#[derive(Debug, Parser)]
#[command(name = "skytrk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search flights between two airports
    Search(SearchCommand),

    /// Follow a flight by its designator
    Track(TrackCommand),

    /// Retrieve the flown track of an aircraft
    Path(PathCommand),

    /// Manage the API credential
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Inspect or clear the snapshot cache
    #[command(subcommand)]
    Cache(CacheCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
