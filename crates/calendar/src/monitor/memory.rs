//! Monitor over an [`InMemoryCalendarStore`]

use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::{CalendarMonitor, MonitorFactory, MonitorSink};
use crate::models::{Calendar, CalendarId, Event, Range};
use crate::storage::{InMemoryCalendarStore, StoreWatcher};

struct MonitorState {
    range: Option<Range>,
    filter: Option<String>,
    /// Everything reported to the timeline and not yet taken back
    reported: HashMap<String, Arc<Event>>,
}

impl MonitorState {
    fn wants(&self, event: &Event) -> bool {
        self.range.is_some_and(|range| event.range().intersects(&range))
            && self.filter.as_deref().is_none_or(|filter| event.matches_text(filter))
    }
}

struct Shared {
    store: Arc<InMemoryCalendarStore>,
    sink: MonitorSink,
    state: Mutex<MonitorState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Diff the store against what was reported, then signal completion
    fn refresh(&self, state: &mut MonitorState) {
        let generation = self.sink.generation();
        let Some(range) = state.range else {
            // Dormant: keep the bookkeeping, the next range reconciles it
            return;
        };

        let desired: Vec<Arc<Event>> = self
            .store
            .events_in_range(&range)
            .into_iter()
            .filter(|event| state.wants(event))
            .collect();
        let desired_uids: HashSet<&str> = desired.iter().map(|e| e.uid.as_str()).collect();

        let mut gone: Vec<Arc<Event>> = state
            .reported
            .values()
            .filter(|e| !desired_uids.contains(e.uid.as_str()))
            .cloned()
            .collect();
        gone.sort_by(|a, b| a.range().cmp(&b.range()));

        for event in gone {
            state.reported.remove(&event.uid);
            self.sink.removed(event);
        }

        for event in desired {
            match state.reported.insert(event.uid.clone(), event.clone()) {
                None => self.sink.added(event),
                Some(old) if !Arc::ptr_eq(&old, &event) => self.sink.updated(old, event),
                Some(_) => {}
            }
        }

        debug!(
            "{}: snapshot of {} delivered ({} event(s))",
            self.sink.calendar_id(),
            range,
            state.reported.len()
        );
        self.sink.completed(generation);
    }
}

impl StoreWatcher for Shared {
    fn event_changed(&self, old: Option<&Arc<Event>>, new: Option<&Arc<Event>>) {
        let mut state = self.lock();
        if state.range.is_none() {
            return;
        }

        let Some(uid) = new.or(old).map(|e| e.uid.clone()) else {
            return;
        };
        let now = new.filter(|event| state.wants(event)).cloned();
        let was = state.reported.remove(&uid);

        match (was, now) {
            (None, Some(new)) => {
                state.reported.insert(uid, new.clone());
                self.sink.added(new);
            }
            (Some(old), Some(new)) => {
                state.reported.insert(uid, new.clone());
                if !Arc::ptr_eq(&old, &new) {
                    self.sink.updated(old, new);
                }
            }
            (Some(old), None) => self.sink.removed(old),
            (None, None) => trace!("{}: ignoring change to {uid}", self.sink.calendar_id()),
        }
    }
}

/// Reports the events of one [`InMemoryCalendarStore`]
///
/// Loads are synchronous: every range or filter change is fully delivered,
/// completion included, before the call returns. Store mutations made while
/// the monitor is active are forwarded as they happen.
pub struct InMemoryCalendarMonitor {
    calendar: Calendar,
    shared: Arc<Shared>,
}

impl InMemoryCalendarMonitor {
    pub fn new(store: Arc<InMemoryCalendarStore>, sink: MonitorSink) -> Self {
        let calendar = store.calendar().clone();
        let shared = Arc::new(Shared {
            store,
            sink,
            state: Mutex::new(MonitorState {
                range: None,
                filter: None,
                reported: HashMap::new(),
            }),
        });

        let watcher: Weak<dyn StoreWatcher> = Arc::downgrade(&shared) as Weak<dyn StoreWatcher>;
        shared.store.watch(watcher);

        Self { calendar, shared }
    }
}

impl CalendarMonitor for InMemoryCalendarMonitor {
    fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    fn set_range(&mut self, range: Option<Range>) {
        let mut state = self.shared.lock();
        debug!(
            "{}: range set to {}",
            self.calendar.id,
            range.map_or_else(|| "(none)".to_string(), |r| r.to_string())
        );
        state.range = range;
        self.shared.refresh(&mut state);
    }

    fn set_filter(&mut self, filter: Option<&str>) {
        let mut state = self.shared.lock();
        state.filter = filter.filter(|f| !f.is_empty()).map(str::to_owned);
        debug!("{}: filter set to {:?}", self.calendar.id, state.filter);
        self.shared.refresh(&mut state);
    }
}

/// Creates [`InMemoryCalendarMonitor`]s from a set of stores
#[derive(Default)]
pub struct InMemoryMonitorFactory {
    stores: HashMap<CalendarId, Arc<InMemoryCalendarStore>>,
}

impl InMemoryMonitorFactory {
    pub fn new(stores: impl IntoIterator<Item = Arc<InMemoryCalendarStore>>) -> Self {
        let mut factory = Self::default();
        for store in stores {
            factory.add_store(store);
        }
        factory
    }

    pub fn add_store(&mut self, store: Arc<InMemoryCalendarStore>) {
        self.stores.insert(store.calendar().id.clone(), store);
    }

    pub fn store(&self, id: &CalendarId) -> Option<&Arc<InMemoryCalendarStore>> {
        self.stores.get(id)
    }

    /// Calendars of every known store, ordered by id
    pub fn calendars(&self) -> Vec<Calendar> {
        let mut calendars: Vec<_> = self.stores.values().map(|s| s.calendar().clone()).collect();
        calendars.sort_by(|a, b| a.id.cmp(&b.id));
        calendars
    }
}

impl MonitorFactory for InMemoryMonitorFactory {
    fn create_monitor(&self, calendar: &Calendar, sink: MonitorSink) -> Box<dyn CalendarMonitor> {
        let store = match self.stores.get(&calendar.id) {
            Some(store) => store.clone(),
            None => {
                warn!("No store for calendar {}, monitoring an empty one", calendar.id);
                Arc::new(InMemoryCalendarStore::new(calendar.clone()))
            }
        };
        Box::new(InMemoryCalendarMonitor::new(store, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{MonitorEvent, MonitorMessage};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Receiver};

    fn day(d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn make_event(uid: &str, summary: &str, d: u32) -> Event {
        Event::builder(uid, "home", Range::starting_at(day(d), Duration::hours(2)))
            .summary(summary)
            .build()
    }

    struct Harness {
        store: Arc<InMemoryCalendarStore>,
        monitor: Box<dyn CalendarMonitor>,
        receiver: Receiver<MonitorMessage>,
        generation: Arc<AtomicU64>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryCalendarStore::new(Calendar::new("home", "Home")));
            let factory = InMemoryMonitorFactory::new([store.clone()]);
            let (sender, receiver) = mpsc::channel();
            let generation = Arc::new(AtomicU64::new(0));
            let sink = MonitorSink::new(
                1,
                CalendarId::new("home"),
                sender,
                generation.clone(),
                Arc::new(AtomicUsize::new(0)),
            );
            let monitor = factory.create_monitor(store.calendar(), sink);
            Self {
                store,
                monitor,
                receiver,
                generation,
            }
        }

        /// Drain the queue as short strings like "+a", "~a", "-a", "done@1"
        fn drain(&self) -> Vec<String> {
            self.receiver
                .try_iter()
                .map(|m| match m.event {
                    MonitorEvent::Added(e) => format!("+{}", e.uid),
                    MonitorEvent::Updated { new, .. } => format!("~{}", new.uid),
                    MonitorEvent::Removed(e) => format!("-{}", e.uid),
                    MonitorEvent::Completed => format!("done@{}", m.generation),
                })
                .collect()
        }
    }

    #[test]
    fn test_dormant_until_range_set() {
        let h = Harness::new();
        h.store.upsert_event(make_event("a", "Alpha", 3)).unwrap();
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_set_range_reports_then_completes() {
        let mut h = Harness::new();
        h.store.upsert_event(make_event("a", "Alpha", 3)).unwrap();
        h.store.upsert_event(make_event("b", "Beta", 10)).unwrap();
        h.store.upsert_event(make_event("c", "Gamma", 25)).unwrap();

        h.monitor.set_range(Some(Range::new(day(1), day(15))));
        assert_eq!(h.drain(), vec!["+a", "+b", "done@0"]);

        h.generation.store(1, Ordering::SeqCst);
        h.monitor.set_range(Some(Range::new(day(8), day(31))));
        assert_eq!(h.drain(), vec!["-a", "+c", "done@1"]);
    }

    #[test]
    fn test_filter_narrows_reported_events() {
        let mut h = Harness::new();
        h.store.upsert_event(make_event("a", "Dentist", 3)).unwrap();
        h.store.upsert_event(make_event("b", "Gym", 4)).unwrap();
        h.monitor.set_range(Some(Range::new(day(1), day(15))));
        h.drain();

        h.monitor.set_filter(Some("dent"));
        assert_eq!(h.drain(), vec!["-b", "done@0"]);

        h.monitor.set_filter(Some(""));
        assert_eq!(h.drain(), vec!["+b", "done@0"]);
    }

    #[test]
    fn test_store_mutations_are_forwarded() {
        let mut h = Harness::new();
        h.monitor.set_range(Some(Range::new(day(1), day(15))));
        h.drain();

        h.store.upsert_event(make_event("a", "Alpha", 3)).unwrap();
        h.store.upsert_event(make_event("a", "Alpha moved", 5)).unwrap();
        // Moving out of range takes it back
        h.store.upsert_event(make_event("a", "Alpha gone", 20)).unwrap();
        // Never in range, never reported
        h.store.upsert_event(make_event("z", "Zeta", 28)).unwrap();
        h.store.remove_event("z");

        assert_eq!(h.drain(), vec!["+a", "~a", "-a"]);
    }

    #[test]
    fn test_dormant_monitor_reconciles_on_next_range() {
        let mut h = Harness::new();
        h.store.upsert_event(make_event("a", "Alpha", 3)).unwrap();
        h.monitor.set_range(Some(Range::new(day(1), day(15))));
        h.drain();

        h.monitor.set_range(None);
        h.store.remove_event("a");
        h.store.upsert_event(make_event("b", "Beta", 4)).unwrap();
        assert!(h.drain().is_empty());

        h.monitor.set_range(Some(Range::new(day(1), day(15))));
        assert_eq!(h.drain(), vec!["-a", "+b", "done@0"]);
    }

    #[test]
    fn test_dropped_monitor_stops_reporting() {
        let mut h = Harness::new();
        h.monitor.set_range(Some(Range::new(day(1), day(15))));
        h.drain();

        let Harness {
            store,
            monitor,
            receiver,
            ..
        } = h;
        drop(monitor);

        store.upsert_event(make_event("a", "Alpha", 3)).unwrap();
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_factory_without_store_monitors_empty_calendar() {
        let factory = InMemoryMonitorFactory::default();
        let (sender, receiver) = mpsc::channel();
        let sink = MonitorSink::new(
            1,
            CalendarId::new("ghost"),
            sender,
            Arc::new(AtomicU64::new(0)),
            Arc::new(AtomicUsize::new(0)),
        );

        let mut monitor = factory.create_monitor(&Calendar::new("ghost", "Ghost"), sink);
        monitor.set_range(Some(Range::new(day(1), day(2))));

        let messages: Vec<_> = receiver.try_iter().collect();
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0].event, MonitorEvent::Completed));
    }
}
