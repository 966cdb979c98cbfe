//! Booking records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{BookingId, EmailAddress, EventId};

/// Booking record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub event_id: EventId,
    /// Normalized (trimmed, lower-case) address
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated insert payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub event_id: EventId,
    pub email: EmailAddress,
}
