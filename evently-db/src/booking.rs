//! Booking integrity gate
//!
//! Validates booking input and checks that the referenced event exists
//! immediately before the write. The event and booking accessors are
//! resolved from the [`ModelRegistry`] on every call.
//!
//! Operations never open the connection themselves. Before the shared pool
//! is ready they fail with [`BookingError::Connection`].
//!
//! The existence check and the insert are two separate store operations.
//! An event deleted between them can leave a booking that references a
//! missing event; no cross-collection transaction is used.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::cache::ConnectionError;
use crate::db::repos::{BookingStore, DbError, EventLookup};
use crate::models::{Booking, BookingId, EmailAddress, EventId, NewBooking, ValidationError};
use crate::registry::ModelRegistry;

/// Terminal outcome of a booking attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOutcome {
    Created,
    RejectedInvalid,
    RejectedNoSuchEvent,
}

/// Errors surfaced by the booking gate
#[derive(Error, Debug)]
pub enum BookingError {
    /// Input failed structural validation; nothing was queried or written
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The referenced event did not exist when checked; nothing was written
    #[error("event does not exist: {event_id}")]
    Integrity { event_id: EventId },

    #[error("booking not found: {0}")]
    UnknownBooking(BookingId),

    /// The shared connection is not established; nothing was queried
    #[error("booking store unreachable: {0}")]
    Connection(#[source] ConnectionError),

    /// Lower-level storage fault. Whether the write committed is unknown.
    #[error("booking persistence failed: {0}")]
    Persistence(#[source] DbError),
}

impl From<DbError> for BookingError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Connection(e) => Self::Connection(e),
            other => Self::Persistence(other),
        }
    }
}

impl BookingOutcome {
    /// Outcome of a finished attempt: `Created` for `Ok`, the rejection kind
    /// for rejections, `None` for faults.
    pub fn of(result: &Result<Booking, BookingError>) -> Option<Self> {
        match result {
            Ok(_) => Some(Self::Created),
            Err(e) => e.outcome(),
        }
    }
}

impl BookingError {
    /// The rejection outcome, or `None` for faults and lookups.
    pub fn outcome(&self) -> Option<BookingOutcome> {
        match self {
            Self::Validation(_) => Some(BookingOutcome::RejectedInvalid),
            Self::Integrity { .. } => Some(BookingOutcome::RejectedNoSuchEvent),
            Self::UnknownBooking(_) | Self::Connection(_) | Self::Persistence(_) => None,
        }
    }

    /// Whether retrying the same input could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Persistence(_))
    }
}

/// Validates and persists bookings against existing events
pub struct BookingGate {
    registry: Arc<ModelRegistry>,
    operation_timeout: Duration,
}

impl BookingGate {
    pub fn new(registry: Arc<ModelRegistry>, operation_timeout: Duration) -> Self {
        Self {
            registry,
            operation_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Create a booking for an existing event.
    ///
    /// The email is trimmed and lower-cased before validation. Validation
    /// failures return before any store is touched.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed email or event id
    /// - `Integrity` if the event does not exist
    /// - `Connection` if the shared connection is not ready yet
    /// - `Persistence` for storage faults or when the check + write exceed
    ///   the operation timeout
    pub async fn create(&self, event_id: &str, email: &str) -> Result<Booking, BookingError> {
        let email = EmailAddress::parse(email).inspect_err(|e| {
            debug!(field = e.field(), error = %e, "booking rejected");
        })?;
        let event_id = EventId::parse(event_id).inspect_err(|e| {
            debug!(field = e.field(), error = %e, "booking rejected");
        })?;

        let booking = self
            .within_deadline(self.commit(NewBooking { event_id, email }))
            .await?;

        info!(booking_id = %booking.id, event_id = %booking.event_id, "booking created");
        Ok(booking)
    }

    /// Point an existing booking at a different event.
    ///
    /// The event check only runs when the reference actually changes; an
    /// unchanged reference returns the stored booking as-is.
    pub async fn reassign(
        &self,
        booking_id: BookingId,
        event_id: &str,
    ) -> Result<Booking, BookingError> {
        let event_id = EventId::parse(event_id)?;
        self.within_deadline(self.repoint(booking_id, event_id)).await
    }

    /// Bookings for one event, oldest first.
    pub async fn list_for_event(&self, event_id: &str) -> Result<Vec<Booking>, BookingError> {
        let event_id = EventId::parse(event_id)?;
        let bookings = self.bookings()?;
        Ok(bookings.list_for_event(event_id).await?)
    }

    pub async fn count_for_event(&self, event_id: &str) -> Result<i64, BookingError> {
        let event_id = EventId::parse(event_id)?;
        let bookings = self.bookings()?;
        Ok(bookings.count_for_event(event_id).await?)
    }

    async fn commit(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        self.ensure_event_exists(booking.event_id).await?;

        let bookings = self.bookings()?;
        bookings
            .insert(booking)
            .await
            .map_err(|e| self.persistence_fault(e))
    }

    async fn repoint(&self, booking_id: BookingId, event_id: EventId) -> Result<Booking, BookingError> {
        let bookings = self.bookings()?;
        let current = bookings.get(booking_id).await.map_err(|e| match e {
            DbError::NotFound { .. } => BookingError::UnknownBooking(booking_id),
            other => self.persistence_fault(other),
        })?;

        if current.event_id == event_id {
            debug!(booking_id = %booking_id, "event reference unchanged");
            return Ok(current);
        }

        self.ensure_event_exists(event_id).await?;
        let updated = bookings
            .update_event(booking_id, event_id)
            .await
            .map_err(|e| self.persistence_fault(e))?;

        info!(booking_id = %booking_id, from = %current.event_id, to = %event_id, "booking reassigned");
        Ok(updated)
    }

    async fn ensure_event_exists(&self, event_id: EventId) -> Result<(), BookingError> {
        let events = self
            .registry
            .require::<dyn EventLookup>()
            .map_err(|e| self.persistence_fault(e))?;

        let exists = events
            .exists(event_id)
            .await
            .map_err(|e| self.persistence_fault(e))?;

        if !exists {
            debug!(event_id = %event_id, "booking rejected: event does not exist");
            return Err(BookingError::Integrity { event_id });
        }

        Ok(())
    }

    fn bookings(&self) -> Result<Arc<dyn BookingStore>, BookingError> {
        self.registry
            .require::<dyn BookingStore>()
            .map_err(|e| self.persistence_fault(e))
    }

    fn persistence_fault(&self, e: DbError) -> BookingError {
        error!(error = %e, "booking store fault");
        BookingError::from(e)
    }

    async fn within_deadline<T, F>(&self, fut: F) -> Result<T, BookingError>
    where
        F: Future<Output = Result<T, BookingError>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(self.persistence_fault(DbError::Timeout(self.operation_timeout))),
        }
    }
}

impl std::fmt::Debug for BookingGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingGate")
            .field("registry", &self.registry)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes() {
        assert_eq!(
            BookingError::from(ValidationError::InvalidEmail).outcome(),
            Some(BookingOutcome::RejectedInvalid)
        );
        assert_eq!(
            BookingError::Integrity {
                event_id: EventId::new()
            }
            .outcome(),
            Some(BookingOutcome::RejectedNoSuchEvent)
        );
        assert_eq!(
            BookingError::from(DbError::Timeout(Duration::from_secs(1))).outcome(),
            None
        );
    }

    #[test]
    fn created_outcome_comes_from_ok() {
        let now = chrono::Utc::now();
        let booking = Booking {
            id: BookingId::new(),
            event_id: EventId::new(),
            email: "a@b.com".into(),
            created_at: now,
            updated_at: now,
        };

        assert_eq!(BookingOutcome::of(&Ok(booking)), Some(BookingOutcome::Created));
        assert_eq!(
            BookingOutcome::of(&Err(ValidationError::InvalidEmail.into())),
            Some(BookingOutcome::RejectedInvalid)
        );
        assert_eq!(
            BookingOutcome::of(&Err(DbError::Timeout(Duration::from_secs(1)).into())),
            None
        );
    }

    #[test]
    fn connection_faults_keep_their_own_kind() {
        let err = BookingError::from(DbError::Connection(ConnectionError::NotReady));
        assert!(matches!(err, BookingError::Connection(ConnectionError::NotReady)));
        assert!(err.is_retryable());
        assert_eq!(err.outcome(), None);
    }

    #[test]
    fn only_store_faults_are_retryable() {
        assert!(BookingError::from(DbError::ModelNotRegistered("Event")).is_retryable());
        assert!(!BookingError::from(ValidationError::InvalidEmail).is_retryable());
        assert!(!BookingError::Integrity {
            event_id: EventId::new()
        }
        .is_retryable());
    }

    #[test]
    fn validation_message_passes_through() {
        let err = BookingError::from(ValidationError::Missing { field: "event id" });
        assert_eq!(err.to_string(), "missing event id");
    }

    #[tokio::test]
    async fn unregistered_models_are_persistence_faults() {
        let gate = BookingGate::new(Arc::new(ModelRegistry::new()), Duration::from_secs(1));
        let err = gate
            .create(&EventId::new().to_string(), "a@b.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BookingError::Persistence(DbError::ModelNotRegistered("Event"))
        ));
    }
}
