//! Tracking whether every calendar finished its current load

use log::debug;
use std::collections::HashSet;

use crate::models::CalendarId;

type CompleteListener = Box<dyn FnMut(bool)>;

/// Which registered calendars delivered their snapshot for the current
/// (range, filter) generation
///
/// The timeline is complete when all of them did; with no calendars it is
/// trivially complete. Listeners are told whenever that flips.
pub(crate) struct CompletionTracker {
    completed: HashSet<CalendarId>,
    calendars: usize,
    complete: bool,
    listeners: Vec<CompleteListener>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self {
            completed: HashSet::new(),
            calendars: 0,
            complete: true,
            listeners: Vec::new(),
        }
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn calendar_count(&self) -> usize {
        self.calendars
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn connect(&mut self, listener: CompleteListener) {
        self.listeners.push(listener);
    }

    pub fn calendar_added(&mut self) {
        self.calendars += 1;
        self.refresh();
    }

    pub fn calendar_removed(&mut self, id: &CalendarId) {
        self.calendars = self.calendars.saturating_sub(1);
        self.completed.remove(id);
        self.refresh();
    }

    /// Record that `id` finished; repeated signals count once
    pub fn mark_completed(&mut self, id: &CalendarId) {
        if self.completed.insert(id.clone()) {
            self.refresh();
        }
    }

    /// Start a new generation: nobody has completed it yet
    pub fn reset(&mut self) {
        self.completed.clear();
        self.refresh();
    }

    fn refresh(&mut self) {
        debug_assert!(self.completed.len() <= self.calendars);

        let complete = self.completed.len() == self.calendars;
        if complete == self.complete {
            return;
        }

        self.complete = complete;
        debug!(
            "Timeline {} ({}/{} calendars)",
            if complete { "complete" } else { "loading" },
            self.completed.len(),
            self.calendars
        );
        for listener in &mut self.listeners {
            listener(complete);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorded(tracker: &mut CompletionTracker) -> Rc<RefCell<Vec<bool>>> {
        let flips = Rc::new(RefCell::new(Vec::new()));
        let sink = flips.clone();
        tracker.connect(Box::new(move |complete| sink.borrow_mut().push(complete)));
        flips
    }

    #[test]
    fn test_empty_is_complete() {
        let tracker = CompletionTracker::new();
        assert!(tracker.is_complete());
        assert_eq!(tracker.completed_count(), 0);
    }

    #[test]
    fn test_flips_when_all_calendars_complete() {
        let mut tracker = CompletionTracker::new();
        let flips = recorded(&mut tracker);
        let work = CalendarId::new("work");
        let home = CalendarId::new("home");

        tracker.calendar_added();
        tracker.calendar_added();
        assert!(!tracker.is_complete());

        tracker.mark_completed(&work);
        tracker.mark_completed(&work);
        assert_eq!(tracker.completed_count(), 1);
        assert!(!tracker.is_complete());

        tracker.mark_completed(&home);
        assert!(tracker.is_complete());
        assert_eq!(*flips.borrow(), vec![false, true]);
    }

    #[test]
    fn test_reset_and_removal() {
        let mut tracker = CompletionTracker::new();
        let work = CalendarId::new("work");
        let home = CalendarId::new("home");
        tracker.calendar_added();
        tracker.calendar_added();
        tracker.mark_completed(&work);

        // Removing the pending calendar leaves only completed ones
        tracker.calendar_removed(&home);
        assert!(tracker.is_complete());

        tracker.reset();
        assert_eq!(tracker.completed_count(), 0);
        assert!(!tracker.is_complete());

        tracker.calendar_removed(&work);
        assert!(tracker.is_complete());
        assert_eq!(tracker.calendar_count(), 0);
    }
}
