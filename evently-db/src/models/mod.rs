//! Domain models with validation at construction
//!
//! Raw request input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod booking;
pub mod email;
pub mod event;
pub mod ids;
pub mod validation;

pub use booking::{Booking, NewBooking};
pub use email::EmailAddress;
pub use event::Event;
pub use ids::{BookingId, EventId};
pub use validation::ValidationError;
