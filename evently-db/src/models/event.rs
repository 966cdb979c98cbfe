//! Event records
//!
//! Events are owned by a separate collection. The core only reads them.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::EventId;

/// Event record from the events collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub slug: String,
    pub location: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Image path or URL
    pub image: String,
}
