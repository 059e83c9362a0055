//! Calendar crate - Event timeline engine
//!
//! This crate provides platform-independent calendar functionality including:
//! - Domain models (Range, Calendar, Event)
//! - An interval index of events (RangeTree)
//! - In-memory calendar stores and JSON calendar files
//! - Calendar monitors that stream event changes for a range and filter
//! - The timeline, which keeps range-bound subscribers up to date
//! - Text search built on a private timeline
//!
//! This crate has zero UI dependencies; views implement
//! [`TimelineSubscriber`] and render however they like.

pub mod config;
pub mod models;
pub mod monitor;
pub mod search;
pub mod storage;
pub mod timeline;

pub use self::config::{SearchConfig, TimelineConfig};
pub use models::{
    Calendar, CalendarId, Event, EventBuilder, Range, RangeError, RangeOverlap, RangePosition,
};
pub use monitor::{
    CalendarMonitor, InMemoryCalendarMonitor, InMemoryMonitorFactory, MonitorEvent,
    MonitorFactory, MonitorMessage, MonitorSink,
};
pub use search::{SearchEngine, SearchModel};
pub use storage::{
    Identity, InMemoryCalendarStore, RangeTree, StoreWatcher, TraverseOrder, load_calendar_file,
    parse_calendars,
};
pub use timeline::{Timeline, TimelineSubscriber};
