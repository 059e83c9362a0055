//! Calendar monitors
//!
//! A monitor watches one calendar for events inside a requested range that
//! match a requested filter. It never calls into the timeline directly:
//! notifications go through a [`MonitorSink`], which queues them for the
//! timeline to handle on its own loop.

mod memory;

pub use memory::{InMemoryCalendarMonitor, InMemoryMonitorFactory};

use log::debug;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::models::{Calendar, CalendarId, Event, Range};

/// Watches a single calendar on behalf of a timeline
///
/// A monitor starts dormant, with no range and no filter. Every call to
/// [`set_range`](CalendarMonitor::set_range) or
/// [`set_filter`](CalendarMonitor::set_filter) starts a new snapshot: the
/// monitor reports what entered and left it, then sends exactly one
/// [`MonitorEvent::Completed`] for the generation that was current when the
/// call was made.
pub trait CalendarMonitor: Send {
    fn calendar(&self) -> &Calendar;

    /// Watch `range`, or go dormant with `None`
    fn set_range(&mut self, range: Option<Range>);

    /// Restrict reported events; `None` reports everything in range
    fn set_filter(&mut self, filter: Option<&str>);
}

/// Creates one monitor per calendar registered with a timeline
pub trait MonitorFactory {
    fn create_monitor(&self, calendar: &Calendar, sink: MonitorSink) -> Box<dyn CalendarMonitor>;
}

/// A change reported by a monitor
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Added(Arc<Event>),
    Updated { old: Arc<Event>, new: Arc<Event> },
    Removed(Arc<Event>),
    /// The snapshot of the stamped generation has been fully delivered
    Completed,
}

/// A queued notification, stamped with its origin
#[derive(Debug, Clone)]
pub struct MonitorMessage {
    /// Unique per monitor instance, so a re-added calendar ignores its
    /// predecessor's leftovers
    pub monitor_id: u64,
    pub calendar_id: CalendarId,
    pub generation: u64,
    pub event: MonitorEvent,
}

/// Posts monitor notifications onto a timeline's queue
///
/// Cheap to clone and safe to move to other threads.
#[derive(Clone)]
pub struct MonitorSink {
    monitor_id: u64,
    calendar_id: CalendarId,
    sender: Sender<MonitorMessage>,
    generation: Arc<AtomicU64>,
    queued: Arc<AtomicUsize>,
}

impl MonitorSink {
    pub fn new(
        monitor_id: u64,
        calendar_id: CalendarId,
        sender: Sender<MonitorMessage>,
        generation: Arc<AtomicU64>,
        queued: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            monitor_id,
            calendar_id,
            sender,
            generation,
            queued,
        }
    }

    pub fn calendar_id(&self) -> &CalendarId {
        &self.calendar_id
    }

    /// The timeline's current load generation.
    ///
    /// Monitors that load asynchronously capture this when a snapshot starts
    /// and pass it to [`completed`](Self::completed) when it ends.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn added(&self, event: Arc<Event>) {
        self.send(self.generation(), MonitorEvent::Added(event));
    }

    pub fn updated(&self, old: Arc<Event>, new: Arc<Event>) {
        self.send(self.generation(), MonitorEvent::Updated { old, new });
    }

    pub fn removed(&self, event: Arc<Event>) {
        self.send(self.generation(), MonitorEvent::Removed(event));
    }

    /// Signal that the snapshot started in `generation` is complete
    pub fn completed(&self, generation: u64) {
        self.send(generation, MonitorEvent::Completed);
    }

    fn send(&self, generation: u64, event: MonitorEvent) {
        let message = MonitorMessage {
            monitor_id: self.monitor_id,
            calendar_id: self.calendar_id.clone(),
            generation,
            event,
        };

        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(message).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            debug!("{}: timeline is gone, dropping notification", self.calendar_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn make_sink() -> (MonitorSink, mpsc::Receiver<MonitorMessage>, Arc<AtomicU64>, Arc<AtomicUsize>) {
        let (sender, receiver) = mpsc::channel();
        let generation = Arc::new(AtomicU64::new(3));
        let queued = Arc::new(AtomicUsize::new(0));
        let sink = MonitorSink::new(7, CalendarId::new("work"), sender, generation.clone(), queued.clone());
        (sink, receiver, generation, queued)
    }

    #[test]
    fn test_messages_are_stamped() {
        let (sink, receiver, generation, queued) = make_sink();

        let snapshot = sink.generation();
        generation.store(4, Ordering::SeqCst);
        sink.completed(snapshot);

        assert_eq!(queued.load(Ordering::SeqCst), 1);
        let message = receiver.try_recv().unwrap();
        assert_eq!(message.monitor_id, 7);
        assert_eq!(message.calendar_id.as_str(), "work");
        assert_eq!(message.generation, 3);
        assert!(matches!(message.event, MonitorEvent::Completed));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (sink, receiver, _, queued) = make_sink();
        drop(receiver);

        sink.completed(sink.generation());
        assert_eq!(queued.load(Ordering::SeqCst), 0);
    }
}
