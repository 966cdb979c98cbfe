//! In-memory store
//!
//! Implements both [`EventLookup`] and [`BookingStore`] over shared maps,
//! with an `event_id -> bookings` index kept in step with every write.
//! Events can be inserted and deleted here because this store also plays
//! the part of the external events collection.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{BookingStore, DbError, EventLookup};
use crate::models::{Booking, BookingId, Event, EventId, NewBooking};

#[derive(Debug, Default)]
struct Collections {
    events: HashMap<EventId, Event>,
    bookings: HashMap<BookingId, Booking>,
    by_event: HashMap<EventId, Vec<BookingId>>,
}

/// Shared in-memory events + bookings collections
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an event.
    pub fn insert_event(&self, event: Event) {
        self.write().events.insert(event.id, event);
    }

    /// Remove an event. Bookings referencing it are left in place.
    pub fn delete_event(&self, id: EventId) -> bool {
        self.write().events.remove(&id).is_some()
    }

    /// Check that the event index matches the bookings exactly.
    pub fn index_is_consistent(&self) -> bool {
        let c = self.read();

        let indexed: usize = c.by_event.values().map(Vec::len).sum();
        if indexed != c.bookings.len() {
            return false;
        }

        c.by_event.iter().all(|(event_id, ids)| {
            ids.iter().all(|id| {
                c.bookings
                    .get(id)
                    .is_some_and(|booking| booking.event_id == *event_id)
            })
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn booking_not_found(id: BookingId) -> DbError {
    DbError::NotFound {
        resource: "booking",
        id: id.to_string(),
    }
}

#[async_trait]
impl EventLookup for MemoryStore {
    async fn exists(&self, id: EventId) -> Result<bool, DbError> {
        // Stand-in for the round trip a real store makes
        tokio::task::yield_now().await;
        Ok(self.read().events.contains_key(&id))
    }

    async fn get(&self, id: EventId) -> Result<Event, DbError> {
        self.read()
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound {
                resource: "event",
                id: id.to_string(),
            })
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert(&self, booking: NewBooking) -> Result<Booking, DbError> {
        let now = Utc::now();
        let booking = Booking {
            id: BookingId::new(),
            event_id: booking.event_id,
            email: booking.email.into_string(),
            created_at: now,
            updated_at: now,
        };

        let mut c = self.write();
        c.by_event
            .entry(booking.event_id)
            .or_default()
            .push(booking.id);
        c.bookings.insert(booking.id, booking.clone());

        Ok(booking)
    }

    async fn get(&self, id: BookingId) -> Result<Booking, DbError> {
        self.read()
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| booking_not_found(id))
    }

    async fn list_for_event(&self, event_id: EventId) -> Result<Vec<Booking>, DbError> {
        let c = self.read();
        let mut bookings: Vec<Booking> = c
            .by_event
            .get(&event_id)
            .into_iter()
            .flatten()
            .filter_map(|id| c.bookings.get(id).cloned())
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn count_for_event(&self, event_id: EventId) -> Result<i64, DbError> {
        let c = self.read();
        Ok(c.by_event.get(&event_id).map_or(0, |ids| ids.len() as i64))
    }

    async fn count(&self) -> Result<i64, DbError> {
        Ok(self.read().bookings.len() as i64)
    }

    async fn update_event(&self, id: BookingId, event_id: EventId) -> Result<Booking, DbError> {
        let mut c = self.write();
        let c = &mut *c;

        let booking = c.bookings.get_mut(&id).ok_or_else(|| booking_not_found(id))?;
        let previous = booking.event_id;
        booking.event_id = event_id;
        booking.updated_at = Utc::now();
        let updated = booking.clone();

        if previous != event_id {
            if let Some(ids) = c.by_event.get_mut(&previous) {
                ids.retain(|b| *b != id);
                if ids.is_empty() {
                    c.by_event.remove(&previous);
                }
            }
            c.by_event.entry(event_id).or_default().push(id);
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailAddress;
    use chrono::{NaiveDate, NaiveTime};

    fn event(slug: &str) -> Event {
        Event {
            id: EventId::new(),
            title: "Rust Meetup".into(),
            slug: slug.into(),
            location: "Oslo".into(),
            date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            image: "/images/event1.png".into(),
        }
    }

    fn new_booking(event_id: EventId, email: &str) -> NewBooking {
        NewBooking {
            event_id,
            email: EmailAddress::parse(email).unwrap(),
        }
    }

    #[tokio::test]
    async fn event_lookup_follows_inserts_and_deletes() {
        let store = MemoryStore::new();
        let e = event("rust-meetup");
        let id = e.id;

        assert!(!store.exists(id).await.unwrap());
        store.insert_event(e.clone());
        assert!(store.exists(id).await.unwrap());
        assert_eq!(EventLookup::get(&store, id).await.unwrap(), e);

        assert!(store.delete_event(id));
        assert!(!store.exists(id).await.unwrap());
        assert!(!store.delete_event(id));
    }

    #[tokio::test]
    async fn insert_maintains_index() {
        let store = MemoryStore::new();
        let a = EventId::new();
        let b = EventId::new();

        store.insert(new_booking(a, "one@example.com")).await.unwrap();
        store.insert(new_booking(a, "two@example.com")).await.unwrap();
        store.insert(new_booking(b, "three@example.com")).await.unwrap();

        assert_eq!(store.count_for_event(a).await.unwrap(), 2);
        assert_eq!(store.count_for_event(b).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 3);
        assert!(store.index_is_consistent());

        let listed = store.list_for_event(a).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|booking| booking.event_id == a));
    }

    #[tokio::test]
    async fn update_event_moves_index_entry() {
        let store = MemoryStore::new();
        let a = EventId::new();
        let b = EventId::new();

        let booking = store.insert(new_booking(a, "x@example.com")).await.unwrap();
        let moved = store.update_event(booking.id, b).await.unwrap();

        assert_eq!(moved.event_id, b);
        assert!(moved.updated_at >= booking.updated_at);
        assert_eq!(moved.created_at, booking.created_at);
        assert_eq!(store.count_for_event(a).await.unwrap(), 0);
        assert_eq!(store.count_for_event(b).await.unwrap(), 1);
        assert!(store.index_is_consistent());
    }

    #[tokio::test]
    async fn update_unknown_booking_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_event(BookingId::new(), EventId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { resource: "booking", .. }));
    }
}
