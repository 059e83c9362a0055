//! Event storage: the interval index and calendar backends

mod file;
mod memory;
mod range_tree;

pub use file::{load_calendar_file, parse_calendars};
pub use memory::{InMemoryCalendarStore, StoreWatcher};
pub use range_tree::{Identity, RangeTree, TraverseOrder};
