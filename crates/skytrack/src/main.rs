//! `skytrk` - CLI for skytrack
//!
//! This binary provides the command-line interface for searching routes,
//! following live flights, and retrieving flown tracks.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Parser;

use skytrack::cli::{
    AuthCommand, CacheCommand, Cli, Command, ConfigCommand, OutputFormat, PathCommand,
    SearchCommand, TrackCommand,
};
use skytrack::correlate::SearchWindow;
use skytrack::credentials::CredentialStore;
use skytrack::flight::{CorrelatedFlight, FlightTrack};
use skytrack::policy::poll_interval;
use skytrack::service::UpdateOutcome;
use skytrack::{init_logging, Config, HttpFlightApi, LiveFlightSnapshot, SnapshotCache, TrackingService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Search(cmd) => handle_search(&config, &cmd).await,
        Command::Track(cmd) => handle_track(&config, &cmd).await,
        Command::Path(cmd) => handle_path(&config, &cmd).await,
        Command::Auth(cmd) => handle_auth(&cmd),
        Command::Cache(cmd) => handle_cache(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

/// Wire up the service from configuration and the credential store.
fn build_service(config: &Config) -> anyhow::Result<TrackingService> {
    let api = HttpFlightApi::new(
        config.api.status_url.clone(),
        config.api.airports_url.clone(),
        config.request_timeout(),
    )?;
    let cache = SnapshotCache::open(config.cache_path(), config.cache.capacity)?;
    let api_key = CredentialStore::default_location().resolve(config)?;
    Ok(TrackingService::new(Arc::new(api), cache, api_key))
}

async fn handle_search(config: &Config, cmd: &SearchCommand) -> anyhow::Result<()> {
    let begin_date = match &cmd.date {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("invalid date: {date} (expected YYYY-MM-DD)"))?,
        None => Utc::now().date_naive(),
    };
    let begin = begin_date.and_time(NaiveTime::MIN).and_utc().timestamp();
    let end = begin + i64::from(cmd.days) * 24 * 60 * 60;
    let window = SearchWindow::new(begin, end)?;

    let service = build_service(config)?;
    let matches = service.search_route(&cmd.from, &cmd.to, window).await?;

    if matches.is_empty() {
        println!("No flights found from {} to {} in that window.", cmd.from, cmd.to);
        return Ok(());
    }

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matches)?),
        OutputFormat::Plain | OutputFormat::Table => print_correlated_table(&matches),
    }
    Ok(())
}

fn print_correlated_table(matches: &[CorrelatedFlight]) {
    println!(
        "{:<10} {:<8} {:<6} {:<6} {:<17} {:<17} {:>8}",
        "CALLSIGN", "ICAO24", "FROM", "TO", "DEPARTED", "ARRIVED", "DURATION"
    );
    for flight in matches {
        let duration_mins = (flight.last_seen - flight.first_seen) / 60;
        println!(
            "{:<10} {:<8} {:<6} {:<6} {:<17} {:<17} {:>5}min",
            flight.callsign.as_deref().unwrap_or("-"),
            flight.icao24,
            flight.est_departure_airport.as_deref().unwrap_or("-"),
            flight.est_arrival_airport,
            fmt_epoch(flight.first_seen),
            fmt_epoch(flight.last_seen),
            duration_mins,
        );
    }
    println!();
    println!("{} flight(s) found.", matches.len());
}

async fn handle_track(config: &Config, cmd: &TrackCommand) -> anyhow::Result<()> {
    let mut service = build_service(config)?;
    let start = service.track(&cmd.designator).await?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&start.snapshot)?),
        OutputFormat::Plain | OutputFormat::Table => {
            print_snapshot(&cmd.designator, &start.snapshot, start.from_cache);
        }
    }

    if !cmd.follow {
        service.stop();
        return Ok(());
    }

    if poll_interval(start.snapshot.status).is_none() {
        println!("Flight is {}; nothing further to follow.", start.snapshot.status);
        service.stop();
        return Ok(());
    }

    println!("Following {} (Ctrl-C to stop)...", cmd.designator);
    let mut events = start.events;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match service.apply_event(event)? {
                    UpdateOutcome::Applied(snapshot) => match cmd.format {
                        OutputFormat::Json => {
                            println!("{}", serde_json::to_string_pretty(&snapshot)?);
                        }
                        OutputFormat::Plain | OutputFormat::Table => {
                            print_snapshot(&cmd.designator, &snapshot, false);
                        }
                    },
                    UpdateOutcome::PollFailed(message) => {
                        eprintln!("warning: {message}");
                    }
                    UpdateOutcome::Superseded => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    service.stop();
    Ok(())
}

fn print_snapshot(designator: &str, snapshot: &LiveFlightSnapshot, from_cache: bool) {
    let source = if from_cache { " (cached)" } else { "" };
    println!("Flight {designator}  [{}]{source}", snapshot.status);
    if let Some(date) = &snapshot.flight_date {
        println!("  Date:      {date}");
    }
    println!(
        "  Departure: {:<5} scheduled {}  actual {}",
        snapshot.departure.iata.as_deref().unwrap_or("-"),
        fmt_time(snapshot.departure.scheduled),
        fmt_time(snapshot.departure.actual),
    );
    println!(
        "  Arrival:   {:<5} scheduled {}  estimated {}",
        snapshot.arrival.iata.as_deref().unwrap_or("-"),
        fmt_time(snapshot.arrival.scheduled),
        fmt_time(snapshot.arrival.estimated),
    );
    match &snapshot.live {
        Some(live) => {
            println!(
                "  Position:  {}, {}  alt {} m  speed {} km/h",
                fmt_coord(live.latitude),
                fmt_coord(live.longitude),
                fmt_num(live.altitude),
                fmt_num(live.speed_horizontal),
            );
        }
        None => println!("  Position:  not transmitting"),
    }
}

async fn handle_path(config: &Config, cmd: &PathCommand) -> anyhow::Result<()> {
    let service = build_service(config)?;
    let track = service.flight_path(&cmd.icao24, cmd.time).await?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&track)?),
        OutputFormat::Plain | OutputFormat::Table => print_track(&track),
    }
    Ok(())
}

fn print_track(track: &FlightTrack) {
    println!(
        "Track for {} ({})",
        track.icao24,
        track.callsign.as_deref().unwrap_or("no callsign"),
    );
    println!(
        "  {} -> {}  ({} waypoints)",
        fmt_epoch(track.start_time),
        fmt_epoch(track.end_time),
        track.path.len(),
    );
    println!();
    println!(
        "{:<17} {:>9} {:>9} {:>8} {:>7}",
        "TIME", "LAT", "LON", "ALT(m)", "GROUND"
    );
    for waypoint in &track.path {
        println!(
            "{:<17} {:>9} {:>9} {:>8} {:>7}",
            fmt_epoch(waypoint.time),
            fmt_coord(waypoint.latitude),
            fmt_coord(waypoint.longitude),
            fmt_num(waypoint.altitude),
            if waypoint.on_ground { "yes" } else { "no" },
        );
    }
}

fn handle_auth(cmd: &AuthCommand) -> anyhow::Result<()> {
    let store = CredentialStore::default_location();
    match cmd {
        AuthCommand::Set { key } => {
            store.store(key)?;
            println!("API key stored at {}", store.path().display());
        }
        AuthCommand::Show => match store.load()? {
            Some(key) => println!("API key: {} ({})", mask_key(&key), store.path().display()),
            None => println!("No API key stored. Run `skytrk auth set <key>`."),
        },
        AuthCommand::Clear => {
            if store.clear()? {
                println!("API key removed.");
            } else {
                println!("No API key was stored.");
            }
        }
    }
    Ok(())
}

fn handle_cache(config: &Config, cmd: &CacheCommand) -> anyhow::Result<()> {
    let cache = SnapshotCache::open(config.cache_path(), config.cache.capacity)?;
    match cmd {
        CacheCommand::Stats { json } => {
            let stats = cache.stats()?;
            if *json {
                let value = serde_json::json!({
                    "entries": stats.entries,
                    "capacity": stats.capacity,
                    "oldest_fetch": stats.oldest_fetch.map(|t| t.to_rfc3339()),
                    "newest_fetch": stats.newest_fetch.map(|t| t.to_rfc3339()),
                    "db_size_bytes": stats.db_size_bytes,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Snapshot cache");
                println!("--------------");
                println!("Path:      {}", cache.path().display());
                println!("Entries:   {} / {}", stats.entries, stats.capacity);
                println!(
                    "Oldest:    {}",
                    stats.oldest_fetch.map_or("-".to_string(), |t| t.to_rfc3339())
                );
                println!(
                    "Newest:    {}",
                    stats.newest_fetch.map_or("-".to_string(), |t| t.to_rfc3339())
                );
                println!("Size:      {} bytes", stats.db_size_bytes);
            }
        }
        CacheCommand::Remove { designator } => {
            if cache.remove(designator)? {
                println!("Removed cached snapshot for {designator}.");
            } else {
                println!("No cached snapshot for {designator}.");
            }
        }
        CacheCommand::Clear { yes } => {
            if *yes {
                let removed = cache.clear()?;
                println!("Removed {removed} cached snapshot(s).");
            } else {
                println!("This will remove all cached snapshots.");
                println!("Use --yes to confirm.");
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Api]");
                println!("  Status URL:    {}", config.api.status_url);
                println!("  Airports URL:  {}", config.api.airports_url);
                println!("  Timeout:       {}s", config.api.timeout_secs);
                println!(
                    "  Key:           {}",
                    config.api.key.as_deref().map_or("not set", |_| "set")
                );
                println!();
                println!("[Cache]");
                println!("  Path:          {}", config.cache_path().display());
                println!("  Capacity:      {}", config.cache.capacity);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

/// Format an optional schedule time as UTC.
fn fmt_time(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// Format an epoch timestamp as UTC, or `-` when out of range.
fn fmt_epoch(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// Format an optional coordinate with fixed precision.
fn fmt_coord(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

/// Format an optional numeric reading without decimals.
fn fmt_num(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.0}"))
}

/// Show only the edges of a stored key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}
