//! The event timeline
//!
//! A [`Timeline`] owns one monitor per registered calendar and an interval
//! index of every event they reported. Subscribers each declare a window;
//! the timeline asks monitors only for the union of those windows and tells
//! each subscriber about the events entering, changing within, and leaving
//! its own window.

mod completion;
mod engine;
mod reconcile;
mod subscriber;

pub use engine::Timeline;
pub use subscriber::TimelineSubscriber;
