//! In-memory calendar store
//!
//! Stands in for a calendar backend: it owns the events of one calendar and
//! tells registered watchers about every mutation, the way a backend client
//! view reports objects added, modified and removed.

use anyhow::{Result, bail};
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::models::{Calendar, Event, Range};

/// Receives every mutation of an [`InMemoryCalendarStore`]
///
/// `old` is the value previously stored under the uid, `new` the value now
/// stored; a removal has no `new`.
pub trait StoreWatcher: Send + Sync {
    fn event_changed(&self, old: Option<&Arc<Event>>, new: Option<&Arc<Event>>);
}

/// Events of a single calendar, keyed by uid
#[derive(Debug)]
pub struct InMemoryCalendarStore {
    calendar: Calendar,
    events: RwLock<HashMap<String, Arc<Event>>>,
    watchers: Mutex<Vec<Weak<dyn StoreWatcher>>>,
}

impl InMemoryCalendarStore {
    /// Create an empty store for `calendar`
    pub fn new(calendar: Calendar) -> Self {
        Self {
            calendar,
            events: RwLock::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Insert or replace an event, returning the stored value
    pub fn upsert_event(&self, event: Event) -> Result<Arc<Event>> {
        if event.calendar_id != self.calendar.id {
            bail!(
                "event {} belongs to calendar {}, not {}",
                event.uid,
                event.calendar_id,
                self.calendar.id
            );
        }

        let event = Arc::new(event);
        let old = {
            let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
            events.insert(event.uid.clone(), event.clone())
        };

        trace!(
            "{}: {} event {}",
            self.calendar.id,
            if old.is_some() { "updated" } else { "added" },
            event.uid
        );
        self.notify(old.as_ref(), Some(&event));
        Ok(event)
    }

    /// Remove an event by uid, returning it if it existed
    pub fn remove_event(&self, uid: &str) -> Option<Arc<Event>> {
        let removed = {
            let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
            events.remove(uid)
        };

        if let Some(event) = &removed {
            trace!("{}: removed event {}", self.calendar.id, event.uid);
            self.notify(Some(event), None);
        }
        removed
    }

    pub fn get_event(&self, uid: &str) -> Option<Arc<Event>> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.get(uid).cloned()
    }

    /// Events intersecting `range`, ordered by range then uid
    pub fn events_in_range(&self, range: &Range) -> Vec<Arc<Event>> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<_> = events
            .values()
            .filter(|e| e.range().intersects(range))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.range().cmp(&b.range()).then_with(|| a.uid.cmp(&b.uid)));
        result
    }

    pub fn count_events(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Register a watcher; it is dropped automatically once its owner is gone
    pub fn watch(&self, watcher: Weak<dyn StoreWatcher>) {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.retain(|w| w.strong_count() > 0);
        watchers.push(watcher);
        debug!("{}: {} live watcher(s)", self.calendar.id, watchers.len());
    }

    fn notify(&self, old: Option<&Arc<Event>>, new: Option<&Arc<Event>>) {
        // Upgrade under the lock, call outside it so watchers may query the store
        let live: Vec<Arc<dyn StoreWatcher>> = {
            let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
            watchers.retain(|w| w.strong_count() > 0);
            watchers.iter().filter_map(Weak::upgrade).collect()
        };

        for watcher in live {
            watcher.event_changed(old, new);
        }
    }
}
