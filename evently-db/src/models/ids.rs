//! Record identifiers

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// Identifier of an event document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an event reference from request input.
    ///
    /// # Example
    /// ```
    /// use evently_db::models::EventId;
    ///
    /// assert!(EventId::parse("0b6a3c1e-8f0e-4a51-9d8e-2f1b6c7d9a10").is_ok());
    /// assert!(EventId::parse("").is_err());
    /// assert!(EventId::parse("event-1").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Missing { field: "event id" });
        }

        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|_| ValidationError::Malformed {
                field: "event id",
                reason: "must be a UUID",
            })
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EventId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a booking document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for BookingId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
