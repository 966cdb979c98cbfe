//! evently CLI - bookings against the shared events database
//!
//! Loads `DATABASE_URL` (and an optional `.env`), wires the process-wide
//! application state, and runs one command:
//! - `migrate`: apply embedded schema migrations
//! - `check`: connect and round-trip a health query
//! - `book`: create a booking for an existing event
//! - `bookings`: list the bookings for one event

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evently_db::{AppState, BookingError, DatabaseConfig, PoolSettings};
use tracing::{debug, info};

mod tracing_setup;

use tracing_setup::{init_tracing, TracingConfig};

/// Exit code for bookings rejected by validation or a missing event
const EXIT_REJECTED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "evently",
    author,
    version,
    about = "Event bookings with a checked event reference"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Pool settings file (defaults to ./evently.toml, then ~/.evently/config.toml)
    #[arg(long, global = true, env = "EVENTLY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Connect to the database and run a health query
    Check,
    /// Create a booking for an existing event
    Book(BookArgs),
    /// List bookings for an event
    Bookings(BookingsArgs),
}

#[derive(clap::Args, Debug)]
struct BookArgs {
    /// Event id (UUID)
    #[arg(long)]
    event: String,

    /// Attendee email address
    #[arg(long)]
    email: String,
}

#[derive(clap::Args, Debug)]
struct BookingsArgs {
    /// Event id (UUID)
    #[arg(long)]
    event: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&TracingConfig { debug: cli.debug })?;

    let settings = match &cli.config {
        Some(path) => PoolSettings::from_file(path)?,
        None => PoolSettings::discover()?,
    };
    let config = DatabaseConfig::from_env_with(settings)?;
    debug!(?config, "database configuration loaded");

    let state = AppState::init_global(AppState::new(config));

    let result = run(state, cli.command).await;
    state.close().await;
    result
}

async fn run(state: &AppState, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Migrate => {
            state.migrate().await.context("migration failed")?;
        }
        Commands::Check => {
            state.health_check().await.context("health check failed")?;
            info!("database reachable");
        }
        Commands::Book(args) => {
            warm(state).await?;
            return book(state, args).await;
        }
        Commands::Bookings(args) => {
            warm(state).await?;
            let bookings = state.bookings().list_for_event(&args.event).await?;
            println!("{}", serde_json::to_string_pretty(&bookings)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Open the shared pool before running booking operations, which never
/// connect on their own.
async fn warm(state: &AppState) -> Result<()> {
    state.pool().await.context("database unavailable")?;
    Ok(())
}

async fn book(state: &AppState, args: BookArgs) -> Result<ExitCode> {
    match state.bookings().create(&args.event, &args.email).await {
        Ok(booking) => {
            println!("{}", serde_json::to_string_pretty(&booking)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.outcome().is_some() => {
            eprintln!("booking rejected: {}", err);
            Ok(ExitCode::from(EXIT_REJECTED))
        }
        Err(err @ BookingError::Persistence(_)) => {
            Err(err).context("booking could not be saved; it may or may not have been written")
        }
        Err(err) => Err(err.into()),
    }
}
