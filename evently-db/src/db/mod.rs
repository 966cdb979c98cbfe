//! Database layer - connection cache, pool and repositories
//!
//! # Design Principles
//!
//! - One pool per process, opened lazily through [`ConnectionCache`]
//! - Repositories acquire the shared pool per operation
//! - Bookings reference events by id; the reference is checked by the
//!   booking gate, not by a database foreign key

pub mod cache;
pub mod pool;
pub mod repos;

pub use cache::{ConnectionCache, ConnectionError, Connector};
pub use pool::{create_pool, health_check, PgCache, PgConnector};
pub use repos::*;

/// Embedded schema migrations
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
