//! Domain models for calendar entities

mod calendar;
mod event;
mod range;

pub use calendar::{Calendar, CalendarId};
pub use event::{Event, EventBuilder};
pub use range::{Range, RangeError, RangeOverlap, RangePosition};
