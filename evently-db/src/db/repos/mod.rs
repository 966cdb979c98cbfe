//! Repository traits and implementations
//!
//! Each model has an async accessor trait so the booking gate can resolve it
//! through the [`ModelRegistry`](crate::registry::ModelRegistry):
//! - PostgreSQL repositories use the shared pool once the connection cache
//!   is ready, and fail with `ConnectionError::NotReady` before that
//! - The in-memory store backs tests and local tooling

pub mod bookings;
pub mod events;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::db::cache::ConnectionError;
use crate::models::{Booking, BookingId, Event, EventId, NewBooking};
use crate::registry::Model;

pub use bookings::PgBookingRepo;
pub use events::PgEventRepo;
pub use memory::MemoryStore;

/// Registry name of the event accessor
pub const EVENT_MODEL: &str = "Event";

/// Registry name of the booking accessor
pub const BOOKING_MODEL: &str = "Booking";

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("model '{0}' is not registered")]
    ModelNotRegistered(&'static str),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Read-only access to the events collection
#[async_trait]
pub trait EventLookup: Send + Sync {
    /// Whether an event with this id exists right now.
    async fn exists(&self, id: EventId) -> Result<bool, DbError>;

    async fn get(&self, id: EventId) -> Result<Event, DbError>;
}

/// Persistence for bookings
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persist a booking; creation and modification timestamps are set by the store.
    async fn insert(&self, booking: NewBooking) -> Result<Booking, DbError>;

    async fn get(&self, id: BookingId) -> Result<Booking, DbError>;

    /// Bookings for one event, oldest first. Served by the event_id index.
    async fn list_for_event(&self, event_id: EventId) -> Result<Vec<Booking>, DbError>;

    async fn count_for_event(&self, event_id: EventId) -> Result<i64, DbError>;

    async fn count(&self) -> Result<i64, DbError>;

    /// Point a booking at another event and bump `updated_at`.
    async fn update_event(&self, id: BookingId, event_id: EventId) -> Result<Booking, DbError>;
}

impl Model for dyn EventLookup {
    const NAME: &'static str = EVENT_MODEL;
}

impl Model for dyn BookingStore {
    const NAME: &'static str = BOOKING_MODEL;
}
