//! Subscriber range reconciliation
//!
//! When a subscriber's window moves from `old` to `new`, only the slices at
//! the two edges can contain events that entered or left it. Each slice is
//! queried from the event index and every candidate is re-checked against
//! the full ranges, since an event spanning a slice may span both windows.

use std::collections::HashSet;
use std::sync::Arc;

use super::TimelineSubscriber;
use crate::models::{Event, Range};
use crate::storage::{Identity, RangeTree};

/// Events entering and leaving a subscriber's window
#[derive(Debug, Default)]
pub(crate) struct RangeDiff {
    pub removed: Vec<Arc<Event>>,
    pub added: Vec<Arc<Event>>,
}

impl RangeDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Removals first, then additions
    pub fn deliver(&self, subscriber: &dyn TimelineSubscriber) {
        for event in &self.removed {
            subscriber.remove_event(event);
        }
        for event in &self.added {
            subscriber.add_event(event);
        }
    }
}

/// Compute what changes for a subscriber moving from `old` to `new`.
///
/// With no previous range everything intersecting `new` is added.
pub(crate) fn reconcile(events: &RangeTree<Arc<Event>>, old: Option<Range>, new: Range) -> RangeDiff {
    let Some(old) = old else {
        return RangeDiff {
            removed: Vec::new(),
            added: sorted(events.data_at_range(&new)),
        };
    };

    if old == new {
        return RangeDiff::default();
    }

    let mut removal_slices = Vec::new();
    let mut addition_slices = Vec::new();

    if !old.intersects(&new) {
        removal_slices.push(old);
        addition_slices.push(new);
    } else {
        if old.start() < new.start() {
            removal_slices.push(Range::new(old.start(), new.start()));
        } else if old.start() > new.start() {
            addition_slices.push(Range::new(new.start(), old.start()));
        }

        if old.end() < new.end() {
            addition_slices.push(Range::new(old.end(), new.end()));
        } else if old.end() > new.end() {
            removal_slices.push(Range::new(new.end(), old.end()));
        }
    }

    let removed = candidates(events, &removal_slices)
        .into_iter()
        .filter(|e| e.range().intersects(&old) && !e.range().intersects(&new))
        .collect();
    let added = candidates(events, &addition_slices)
        .into_iter()
        .filter(|e| e.range().intersects(&new) && !e.range().intersects(&old))
        .collect();

    RangeDiff {
        removed: sorted(removed),
        added: sorted(added),
    }
}

/// Union of the slice queries, each event at most once
fn candidates(events: &RangeTree<Arc<Event>>, slices: &[Range]) -> Vec<Arc<Event>> {
    let mut seen = HashSet::new();
    slices
        .iter()
        .flat_map(|slice| events.data_at_range(slice))
        .filter(|event| seen.insert(event.identity()))
        .collect()
}

fn sorted(mut events: Vec<Arc<Event>>) -> Vec<Arc<Event>> {
    events.sort_by(|a, b| a.range().cmp(&b.range()).then_with(|| a.uid.cmp(&b.uid)));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn range(start: u32, end: u32) -> Range {
        Range::new(day(start), day(end))
    }

    fn make_index(spans: &[(&str, u32, u32)]) -> RangeTree<Arc<Event>> {
        let mut tree = RangeTree::new();
        for (uid, start, end) in spans {
            let event = Arc::new(Event::builder(*uid, "c", range(*start, *end)).build());
            tree.add(event.range(), event);
        }
        tree
    }

    fn uids(events: &[Arc<Event>]) -> Vec<&str> {
        events.iter().map(|e| e.uid.as_str()).collect()
    }

    #[test]
    fn test_initial_attach_adds_everything_in_range() {
        let index = make_index(&[("a", 2, 3), ("b", 10, 12), ("c", 20, 21)]);
        let diff = reconcile(&index, None, range(1, 15));

        assert!(diff.removed.is_empty());
        assert_eq!(uids(&diff.added), vec!["a", "b"]);
    }

    #[test]
    fn test_unchanged_range_is_empty() {
        let index = make_index(&[("a", 2, 3)]);
        assert!(reconcile(&index, Some(range(1, 15)), range(1, 15)).is_empty());
    }

    #[test]
    fn test_window_slides_forward() {
        let index = make_index(&[("a", 2, 3), ("b", 10, 12), ("c", 20, 21)]);
        let diff = reconcile(&index, Some(range(1, 15)), range(9, 25));

        assert_eq!(uids(&diff.removed), vec!["a"]);
        assert_eq!(uids(&diff.added), vec!["c"]);
    }

    #[test]
    fn test_window_grows_at_both_edges() {
        let index = make_index(&[("a", 2, 3), ("b", 10, 12), ("c", 20, 21)]);
        let diff = reconcile(&index, Some(range(9, 15)), range(1, 25));

        assert!(diff.removed.is_empty());
        assert_eq!(uids(&diff.added), vec!["a", "c"]);
    }

    #[test]
    fn test_window_shrinks_at_both_edges() {
        let index = make_index(&[("a", 2, 3), ("b", 10, 12), ("c", 20, 21)]);
        let diff = reconcile(&index, Some(range(1, 25)), range(9, 15));

        assert_eq!(uids(&diff.removed), vec!["a", "c"]);
        assert!(diff.added.is_empty());
    }

    #[test]
    fn test_spanning_event_neither_added_nor_removed() {
        let index = make_index(&[("long", 1, 30), ("edge", 4, 6)]);
        let diff = reconcile(&index, Some(range(2, 10)), range(5, 20));

        // "long" shows up in both slices but stays visible
        assert!(diff.removed.is_empty());
        assert!(diff.added.is_empty());
    }

    #[test]
    fn test_disjoint_ranges_swap_everything() {
        let index = make_index(&[("a", 2, 3), ("b", 20, 21), ("long", 1, 30)]);
        let diff = reconcile(&index, Some(range(1, 5)), range(15, 25));

        // "long" covers both windows, so it never leaves
        assert_eq!(uids(&diff.removed), vec!["a"]);
        assert_eq!(uids(&diff.added), vec!["b"]);
    }

    #[test]
    fn test_event_touching_old_end_is_added() {
        // [5, 6) does not intersect [1, 5) but does intersect [1, 8)
        let index = make_index(&[("touch", 5, 6)]);
        let diff = reconcile(&index, Some(range(1, 5)), range(1, 8));

        assert_eq!(uids(&diff.added), vec!["touch"]);
    }

    #[test]
    fn test_candidates_deduplicate_across_slices() {
        let index = make_index(&[("long", 1, 30)]);
        let found = candidates(&index, &[range(1, 3), range(20, 25)]);
        assert_eq!(found.len(), 1);
    }
}
