//! The capability implemented by timeline consumers

use std::sync::Arc;

use crate::models::{Event, Range};

/// A consumer that wants a live, range-bounded view of events
///
/// Subscribers are registered as `Arc<dyn TimelineSubscriber>` and identified
/// by pointer, so their callbacks take `&self`; use interior mutability for
/// any state they update.
///
/// Callbacks must be quick and must not call back into the timeline. After
/// changing what [`range`](TimelineSubscriber::range) returns, the owner
/// calls [`Timeline::subscriber_range_changed`](super::Timeline::subscriber_range_changed).
pub trait TimelineSubscriber {
    /// The window this subscriber currently wants to see
    fn range(&self) -> Range;

    fn add_event(&self, event: &Arc<Event>);

    fn update_event(&self, old: &Arc<Event>, new: &Arc<Event>);

    fn remove_event(&self, event: &Arc<Event>);
}
