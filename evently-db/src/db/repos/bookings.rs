//! Booking repository

use std::sync::Arc;

use async_trait::async_trait;

use super::{BookingStore, DbError};
use crate::db::pool::PgCache;
use crate::models::{Booking, BookingId, EventId, NewBooking};

/// Booking repository
pub struct PgBookingRepo {
    cache: Arc<PgCache>,
}

impl PgBookingRepo {
    pub fn new(cache: Arc<PgCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl BookingStore for PgBookingRepo {
    async fn insert(&self, booking: NewBooking) -> Result<Booking, DbError> {
        let pool = self.cache.ready()?;

        let booking: Booking = sqlx::query_as(
            r#"
            INSERT INTO bookings (event_id, email)
            VALUES ($1, $2)
            RETURNING id, event_id, email, created_at, updated_at
            "#,
        )
        .bind(booking.event_id)
        .bind(booking.email.as_str())
        .fetch_one(&pool)
        .await?;

        Ok(booking)
    }

    async fn get(&self, id: BookingId) -> Result<Booking, DbError> {
        let pool = self.cache.ready()?;

        let booking: Booking = sqlx::query_as(
            r#"
            SELECT id, event_id, email, created_at, updated_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| DbError::NotFound {
            resource: "booking",
            id: id.to_string(),
        })?;

        Ok(booking)
    }

    async fn list_for_event(&self, event_id: EventId) -> Result<Vec<Booking>, DbError> {
        let pool = self.cache.ready()?;

        let bookings: Vec<Booking> = sqlx::query_as(
            r#"
            SELECT id, event_id, email, created_at, updated_at
            FROM bookings
            WHERE event_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&pool)
        .await?;

        Ok(bookings)
    }

    async fn count_for_event(&self, event_id: EventId) -> Result<i64, DbError> {
        let pool = self.cache.ready()?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&pool)
            .await?;

        Ok(count.0)
    }

    async fn count(&self) -> Result<i64, DbError> {
        let pool = self.cache.ready()?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings")
            .fetch_one(&pool)
            .await?;

        Ok(count.0)
    }

    async fn update_event(&self, id: BookingId, event_id: EventId) -> Result<Booking, DbError> {
        let pool = self.cache.ready()?;

        let booking: Booking = sqlx::query_as(
            r#"
            UPDATE bookings
            SET event_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, event_id, email, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(event_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| DbError::NotFound {
            resource: "booking",
            id: id.to_string(),
        })?;

        Ok(booking)
    }
}
