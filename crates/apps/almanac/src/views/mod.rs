//! Text views for Almanac
//!
//! Every view is a timeline subscriber: it keeps the events the timeline
//! hands it and renders them on demand.

mod agenda;
mod month;
mod search_results;

pub use agenda::AgendaView;
pub use month::MonthView;
pub use search_results::render_search_results;

use calendar::Range;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// `days` whole days starting at `date`
pub fn days_range(date: NaiveDate, days: u64) -> Range {
    let end = date.checked_add_days(Days::new(days)).unwrap_or(date);
    Range::new(start_of_day(date), start_of_day(end))
}
