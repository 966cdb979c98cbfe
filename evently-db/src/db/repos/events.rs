//! Event repository (read-only)

use std::sync::Arc;

use async_trait::async_trait;

use super::{DbError, EventLookup};
use crate::db::pool::PgCache;
use crate::models::{Event, EventId};

/// Event repository
pub struct PgEventRepo {
    cache: Arc<PgCache>,
}

impl PgEventRepo {
    pub fn new(cache: Arc<PgCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl EventLookup for PgEventRepo {
    async fn exists(&self, id: EventId) -> Result<bool, DbError> {
        let pool = self.cache.ready()?;

        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
            .bind(id)
            .fetch_one(&pool)
            .await?;

        Ok(exists.0)
    }

    async fn get(&self, id: EventId) -> Result<Event, DbError> {
        let pool = self.cache.ready()?;

        let event: Event = sqlx::query_as(
            r#"
            SELECT id, title, slug, location, date, time, image
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| DbError::NotFound {
            resource: "event",
            id: id.to_string(),
        })?;

        Ok(event)
    }
}
