//! evently-db: connection lifecycle and booking integrity
//!
//! - [`db::ConnectionCache`] hands every caller the one process-wide pool,
//!   opening it lazily with at most one attempt in flight
//! - [`booking::BookingGate`] validates bookings and checks that the
//!   referenced event exists before writing
//! - [`registry::ModelRegistry`] lets the gate resolve the event model at
//!   call time

pub mod booking;
pub mod config;
pub mod db;
pub mod models;
pub mod registry;
pub mod state;

pub use booking::{BookingError, BookingGate, BookingOutcome};
pub use config::{ConfigError, DatabaseConfig, PoolSettings};
pub use db::{ConnectionCache, ConnectionError, Connector, DbError};
pub use registry::ModelRegistry;
pub use state::AppState;
