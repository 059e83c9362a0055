//! Search results as a timeline subscriber

use log::trace;
use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::{Event, Range};
use crate::timeline::TimelineSubscriber;

/// Sorted search hits over a fixed window
///
/// Hits are ordered by start time, then summary. Every matching event in the
/// window is kept, but only the first `max_results` are exposed, so removing
/// a hit lets the next one move up. Events that do not match the query are
/// ignored, so cached results of an earlier search never show up.
pub struct SearchModel {
    range: Range,
    query: String,
    max_results: usize,
    matches: RwLock<Vec<Arc<Event>>>,
}

fn compare_hits(a: &Event, b: &Event) -> Ordering {
    a.range()
        .start()
        .cmp(&b.range().start())
        .then_with(|| a.summary.cmp(&b.summary))
        .then_with(|| a.uid.cmp(&b.uid))
}

impl SearchModel {
    pub fn new(range: Range, query: impl Into<String>, max_results: usize) -> Self {
        Self {
            range,
            query: query.into(),
            max_results,
            matches: RwLock::new(Vec::new()),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Current hits, best first, at most `max_results`
    pub fn hits(&self) -> Vec<Arc<Event>> {
        let matches = self.matches.read().unwrap_or_else(PoisonError::into_inner);
        matches.iter().take(self.max_results).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.total_matches().min(self.max_results)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching events in the window, including those past the cap
    pub fn total_matches(&self) -> usize {
        self.matches.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn insert(&self, matches: &mut Vec<Arc<Event>>, event: &Arc<Event>) {
        if !event.matches_text(&self.query) {
            return;
        }

        let position = matches
            .binary_search_by(|hit| compare_hits(hit, event))
            .unwrap_or_else(|position| position);
        if position >= self.max_results {
            trace!("'{}' sorts past the first {} hits", event.summary, self.max_results);
        }
        matches.insert(position, event.clone());
    }
}

impl TimelineSubscriber for SearchModel {
    fn range(&self) -> Range {
        self.range
    }

    fn add_event(&self, event: &Arc<Event>) {
        let mut matches = self.matches.write().unwrap_or_else(PoisonError::into_inner);
        trace!("Adding search hit '{}'", event.summary);
        self.insert(&mut matches, event);
    }

    fn update_event(&self, old: &Arc<Event>, new: &Arc<Event>) {
        let mut matches = self.matches.write().unwrap_or_else(PoisonError::into_inner);
        matches.retain(|hit| hit.uid != old.uid);
        self.insert(&mut matches, new);
    }

    fn remove_event(&self, event: &Arc<Event>) {
        let mut matches = self.matches.write().unwrap_or_else(PoisonError::into_inner);
        matches.retain(|hit| hit.uid != event.uid);
    }
}
