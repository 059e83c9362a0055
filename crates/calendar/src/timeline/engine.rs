//! The timeline orchestrator

use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use super::completion::CompletionTracker;
use super::reconcile::reconcile;
use super::TimelineSubscriber;
use crate::config::TimelineConfig;
use crate::models::{Calendar, CalendarId, Event, Range};
use crate::monitor::{CalendarMonitor, MonitorEvent, MonitorFactory, MonitorMessage, MonitorSink};
use crate::storage::{Identity, RangeTree};

struct CalendarEntry {
    monitor_id: u64,
    monitor: Box<dyn CalendarMonitor>,
}

struct SubscriberEntry {
    subscriber: Arc<dyn TimelineSubscriber>,
    /// Last reconciled range
    range: Range,
}

struct StoredEvent {
    calendar_id: CalendarId,
    event: Arc<Event>,
}

/// Keeps every subscriber showing exactly the events inside its range
///
/// The timeline caches the events of all registered calendars for the union
/// of its subscribers' ranges (the global range). Monitor notifications are
/// queued and applied by [`dispatch`](Timeline::dispatch); subscriber
/// registration and range changes apply immediately.
pub struct Timeline {
    config: TimelineConfig,
    factory: Arc<dyn MonitorFactory>,

    sender: Sender<MonitorMessage>,
    receiver: Receiver<MonitorMessage>,
    generation: Arc<AtomicU64>,
    queued: Arc<AtomicUsize>,
    next_monitor_id: u64,

    calendars: HashMap<CalendarId, CalendarEntry>,

    events: RangeTree<Arc<Event>>,
    events_by_uid: HashMap<String, StoredEvent>,
    calendar_events: HashMap<CalendarId, HashSet<String>>,

    subscribers: HashMap<usize, SubscriberEntry>,
    subscriber_ranges: RangeTree<Arc<dyn TimelineSubscriber>>,

    range: Option<Range>,
    filter: Option<String>,
    completion: CompletionTracker,
    range_update_pending: bool,
}

impl Timeline {
    pub fn new(factory: Arc<dyn MonitorFactory>, config: TimelineConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            config,
            factory,
            sender,
            receiver,
            generation: Arc::new(AtomicU64::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
            next_monitor_id: 0,
            calendars: HashMap::new(),
            events: RangeTree::new(),
            events_by_uid: HashMap::new(),
            calendar_events: HashMap::new(),
            subscribers: HashMap::new(),
            subscriber_ranges: RangeTree::new(),
            range: None,
            filter: None,
            completion: CompletionTracker::new(),
            range_update_pending: false,
        }
    }

    // ------------------------------------------------------------------
    // Calendars

    /// Start monitoring `calendar`. No-op if it is already registered.
    pub fn add_calendar(&mut self, calendar: &Calendar) {
        if self.calendars.contains_key(&calendar.id) {
            debug!("Calendar {} already in timeline", calendar.id);
            return;
        }

        self.next_monitor_id += 1;
        let monitor_id = self.next_monitor_id;
        let sink = MonitorSink::new(
            monitor_id,
            calendar.id.clone(),
            self.sender.clone(),
            self.generation.clone(),
            self.queued.clone(),
        );
        let mut monitor = self.factory.create_monitor(calendar, sink);
        debug!("Adding calendar {} to timeline", calendar.id);

        self.completion.calendar_added();

        if let Some(range) = self.range {
            monitor.set_filter(self.filter.as_deref());
            monitor.set_range(Some(range));
        }

        self.calendars
            .insert(calendar.id.clone(), CalendarEntry { monitor_id, monitor });
    }

    /// Stop monitoring a calendar and take back every event it reported.
    /// No-op if it is not registered.
    pub fn remove_calendar(&mut self, id: &CalendarId) {
        let Some(entry) = self.calendars.remove(id) else {
            return;
        };
        drop(entry);
        debug!("Removing calendar {id} from timeline");

        let mut uids: Vec<String> = self
            .calendar_events
            .remove(id)
            .map(|uids| uids.into_iter().collect())
            .unwrap_or_default();
        uids.sort();

        for uid in uids {
            let Some(event) = self.events_by_uid.get(&uid).map(|s| s.event.clone()) else {
                continue;
            };
            for subscriber in self.interested_subscribers(&event.range()) {
                subscriber.remove_event(&event);
            }
            self.unstore_event(&uid);
        }

        self.completion.calendar_removed(id);
    }

    pub fn contains_calendar(&self, id: &CalendarId) -> bool {
        self.calendars.contains_key(id)
    }

    // ------------------------------------------------------------------
    // Subscribers

    /// Register a subscriber and hand it every cached event inside its
    /// range. No-op if it is already registered.
    pub fn add_subscriber(&mut self, subscriber: Arc<dyn TimelineSubscriber>) {
        let key = subscriber.identity();
        if self.subscribers.contains_key(&key) {
            debug!("Subscriber already in timeline");
            return;
        }

        let range = subscriber.range();
        debug!("Adding subscriber with range {range}");

        reconcile(&self.events, None, range).deliver(&*subscriber);

        self.subscriber_ranges.add(range, subscriber.clone());
        self.subscribers
            .insert(key, SubscriberEntry { subscriber, range });

        self.schedule_range_update();
    }

    /// Unregister a subscriber. It is not told to drop its events.
    /// No-op if it is not registered.
    pub fn remove_subscriber<S: TimelineSubscriber + ?Sized>(&mut self, subscriber: &Arc<S>) {
        let Some(entry) = self.subscribers.remove(&subscriber.identity()) else {
            return;
        };
        debug!("Removing subscriber with range {}", entry.range);

        self.subscriber_ranges.remove(&entry.range, &entry.subscriber);
        self.schedule_range_update();
    }

    /// Reconcile a subscriber after its [`range`](TimelineSubscriber::range)
    /// changed: it loses the events that left its window and receives the
    /// ones that entered it.
    ///
    /// # Panics
    /// Panics if the subscriber is not registered.
    pub fn subscriber_range_changed<S: TimelineSubscriber + ?Sized>(&mut self, subscriber: &Arc<S>) {
        let key = subscriber.identity();
        let Some(entry) = self.subscribers.get(&key) else {
            panic!("range change reported by a subscriber that is not registered");
        };

        let subscriber = entry.subscriber.clone();
        let old = entry.range;
        let new = subscriber.range();
        if old == new {
            return;
        }
        debug!("Subscriber range changed from {old} to {new}");

        let diff = reconcile(&self.events, Some(old), new);
        if !diff.is_empty() {
            trace!(
                "Subscriber loses {} event(s), gains {}",
                diff.removed.len(),
                diff.added.len()
            );
        }
        diff.deliver(&*subscriber);

        self.subscriber_ranges.remove(&old, &subscriber);
        self.subscriber_ranges.add(new, subscriber);
        if let Some(entry) = self.subscribers.get_mut(&key) {
            entry.range = new;
        }

        self.schedule_range_update();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    // ------------------------------------------------------------------
    // Range and filter

    /// The union of all subscriber ranges, if there are subscribers
    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Change the filter passed to every monitor. `None` and `""` both mean
    /// no filter.
    pub fn set_filter(&mut self, filter: Option<&str>) {
        let filter = filter.filter(|f| !f.is_empty());
        if filter == self.filter.as_deref() {
            return;
        }

        debug!("Timeline filter changed to {filter:?}");
        self.filter = filter.map(str::to_owned);
        self.start_generation();

        for entry in self.calendars.values_mut() {
            entry.monitor.set_filter(filter);
        }
    }

    fn schedule_range_update(&mut self) {
        if self.config.coalesce_range_updates {
            self.range_update_pending = true;
        } else {
            self.update_range();
        }
    }

    /// Recompute the global range and re-point monitors if it moved
    fn update_range(&mut self) {
        self.range_update_pending = false;

        let range = self
            .subscribers
            .values()
            .map(|entry| entry.range)
            .reduce(|a, b| a.union(&b));
        if range == self.range {
            return;
        }

        match range {
            Some(range) => debug!("Global range changed to {range}"),
            None => debug!("Global range cleared"),
        }
        self.range = range;
        self.start_generation();

        for entry in self.calendars.values_mut() {
            entry.monitor.set_range(range);
        }
    }

    /// Every monitor must reload and complete again
    fn start_generation(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.completion.reset();
    }

    // ------------------------------------------------------------------
    // Events

    /// Cached events intersecting `range`, ordered by range
    pub fn events_at_range(&self, range: &Range) -> Vec<Arc<Event>> {
        let mut events = self.events.data_at_range(range);
        events.sort_by(|a, b| a.range().cmp(&b.range()).then_with(|| a.uid.cmp(&b.uid)));
        events
    }

    pub fn event_count(&self) -> usize {
        self.events_by_uid.len()
    }

    // ------------------------------------------------------------------
    // Completion

    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }

    pub fn completed_count(&self) -> usize {
        self.completion.completed_count()
    }

    pub fn calendar_count(&self) -> usize {
        self.completion.calendar_count()
    }

    /// Call `listener` with the new value whenever [`is_complete`](Self::is_complete) flips
    pub fn connect_complete_changed(&mut self, listener: impl FnMut(bool) + 'static) {
        self.completion.connect(Box::new(listener));
    }

    // ------------------------------------------------------------------
    // Dispatch

    /// Whether monitor notifications or a deferred range update are waiting
    pub fn has_pending(&self) -> bool {
        self.range_update_pending || self.queued.load(Ordering::SeqCst) > 0
    }

    /// Run a deferred range update, then apply up to
    /// `dispatch_batch_size` queued notifications. Returns how many were
    /// handled.
    pub fn dispatch(&mut self) -> usize {
        if self.range_update_pending {
            self.update_range();
        }

        let batch = self.config.dispatch_batch_size.max(1);
        let mut handled = 0;
        while handled < batch {
            let Ok(message) = self.receiver.try_recv() else {
                break;
            };
            self.queued.fetch_sub(1, Ordering::SeqCst);
            self.handle_message(message);
            handled += 1;
        }

        if handled > 0 {
            trace!("Dispatched {handled} monitor notification(s)");
        }
        handled
    }

    /// Dispatch until nothing is queued
    pub fn dispatch_all(&mut self) -> usize {
        let mut total = 0;
        loop {
            let handled = self.dispatch();
            if handled == 0 {
                return total;
            }
            total += handled;
        }
    }

    fn handle_message(&mut self, message: MonitorMessage) {
        let MonitorMessage {
            monitor_id,
            calendar_id,
            generation,
            event,
        } = message;

        let registered = self
            .calendars
            .get(&calendar_id)
            .is_some_and(|entry| entry.monitor_id == monitor_id);
        if !registered {
            trace!("Dropping notification from unregistered calendar {calendar_id}");
            return;
        }

        match event {
            MonitorEvent::Added(event) => self.event_added(&calendar_id, event),
            MonitorEvent::Updated { old, new } => self.event_updated(&calendar_id, &old, new),
            MonitorEvent::Removed(event) => self.event_removed(&calendar_id, &event),
            MonitorEvent::Completed => self.monitor_completed(&calendar_id, generation),
        }
    }

    fn event_added(&mut self, calendar_id: &CalendarId, event: Arc<Event>) {
        if let Some(existing) = self.events_by_uid.get(&event.uid).map(|s| s.event.clone()) {
            debug!("Event {} added twice, replacing it", event.uid);
            self.event_updated(calendar_id, &existing, event);
            return;
        }

        trace!("Event {} added at {}", event.uid, event.range());
        self.store_event(calendar_id, event.clone());

        for subscriber in self.interested_subscribers(&event.range()) {
            subscriber.add_event(&event);
        }
    }

    fn event_updated(&mut self, calendar_id: &CalendarId, old: &Arc<Event>, new: Arc<Event>) {
        if old.uid != new.uid {
            warn!("Update changes uid {} to {}, treating as replacement", old.uid, new.uid);
            self.event_removed(calendar_id, old);
            self.event_added(calendar_id, new);
            return;
        }

        // Subscribers hold the stored value, which may differ from `old`
        let Some(stored) = self.events_by_uid.get(&new.uid) else {
            debug!("Update for unknown event {}, adding it", new.uid);
            self.event_added(calendar_id, new);
            return;
        };
        if &stored.calendar_id != calendar_id {
            warn!(
                "Calendar {calendar_id} updated event {} owned by {}",
                new.uid, stored.calendar_id
            );
            return;
        }
        let stored = stored.event.clone();

        trace!("Event {} moved from {} to {}", new.uid, stored.range(), new.range());
        self.unstore_event(&stored.uid);
        self.store_event(calendar_id, new.clone());

        let before = self.interested_subscribers(&stored.range());
        let after = self.interested_subscribers(&new.range());
        let before_keys: HashSet<usize> = before.iter().map(|s| s.identity()).collect();
        let after_keys: HashSet<usize> = after.iter().map(|s| s.identity()).collect();

        for subscriber in before.iter().filter(|s| !after_keys.contains(&s.identity())) {
            subscriber.remove_event(&stored);
        }
        for subscriber in &after {
            if before_keys.contains(&subscriber.identity()) {
                subscriber.update_event(&stored, &new);
            } else {
                subscriber.add_event(&new);
            }
        }
    }

    fn event_removed(&mut self, calendar_id: &CalendarId, event: &Arc<Event>) {
        let Some(stored) = self.events_by_uid.get(&event.uid) else {
            warn!("Calendar {calendar_id} removed unknown event {}", event.uid);
            return;
        };
        if &stored.calendar_id != calendar_id {
            warn!(
                "Calendar {calendar_id} removed event {} owned by {}",
                event.uid, stored.calendar_id
            );
            return;
        }

        let stored = stored.event.clone();
        trace!("Event {} removed", stored.uid);

        // Fan out before unindexing
        for subscriber in self.interested_subscribers(&stored.range()) {
            subscriber.remove_event(&stored);
        }
        self.unstore_event(&stored.uid);
    }

    fn monitor_completed(&mut self, calendar_id: &CalendarId, generation: u64) {
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!("Ignoring stale completion from {calendar_id}");
            return;
        }
        trace!("Calendar {calendar_id} completed");
        self.completion.mark_completed(calendar_id);
    }

    fn store_event(&mut self, calendar_id: &CalendarId, event: Arc<Event>) {
        self.events.add(event.range(), event.clone());
        self.calendar_events
            .entry(calendar_id.clone())
            .or_default()
            .insert(event.uid.clone());
        self.events_by_uid.insert(
            event.uid.clone(),
            StoredEvent {
                calendar_id: calendar_id.clone(),
                event,
            },
        );
    }

    fn unstore_event(&mut self, uid: &str) -> Option<Arc<Event>> {
        let StoredEvent { calendar_id, event } = self.events_by_uid.remove(uid)?;

        if let Some(uids) = self.calendar_events.get_mut(&calendar_id) {
            uids.remove(uid);
        }
        let removed = self.events.remove(&event.range(), &event);
        debug_assert!(removed, "event {uid} missing from the range index");

        Some(event)
    }

    /// Subscribers whose last reconciled range intersects `range`
    fn interested_subscribers(&self, range: &Range) -> Vec<Arc<dyn TimelineSubscriber>> {
        self.subscriber_ranges
            .data_at_range(range)
            .into_iter()
            .filter(|subscriber| {
                self.subscribers
                    .get(&subscriber.identity())
                    .is_some_and(|entry| entry.range.intersects(range))
            })
            .collect()
    }
}
