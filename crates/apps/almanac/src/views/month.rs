//! Month view - a six week grid marking busy days

use calendar::{Event, Range, TimelineSubscriber};
use chrono::{Datelike, Days, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::days_range;

const GRID_DAYS: u64 = 42;

pub struct MonthView {
    /// First of the month
    month: NaiveDate,
    /// Monday on or before the first of the month
    grid_start: NaiveDate,
    events: RwLock<HashMap<String, Arc<Event>>>,
}

impl MonthView {
    /// Grid for the month containing `date`
    pub fn new(date: NaiveDate) -> Self {
        let month = date.with_day(1).unwrap_or(date);
        let lead = u64::from(month.weekday().num_days_from_monday());
        let grid_start = month.checked_sub_days(Days::new(lead)).unwrap_or(month);
        Self {
            month,
            grid_start,
            events: RwLock::new(HashMap::new()),
        }
    }

    /// Number of events touching each day of the grid that has any
    pub fn busy_days(&self) -> BTreeMap<NaiveDate, usize> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let mut busy = BTreeMap::new();

        for day in self.grid_start.iter_days().take(GRID_DAYS as usize) {
            let range = days_range(day, 1);
            let count = events
                .values()
                .filter(|e| e.range().intersects(&range))
                .count();
            if count > 0 {
                busy.insert(day, count);
            }
        }
        busy
    }

    /// Month title, weekday header and grid. Busy days carry a `*`; days of
    /// neighbouring months are left blank.
    pub fn render(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let busy = self.busy_days();

        writeln!(out, "{:^28}", self.month.format("%B %Y").to_string())?;
        writeln!(out, " Mo  Tu  We  Th  Fr  Sa  Su")?;

        let days: Vec<NaiveDate> = self
            .grid_start
            .iter_days()
            .take(GRID_DAYS as usize)
            .collect();
        for week in days.chunks(7) {
            if week.iter().all(|d| d.month() != self.month.month()) {
                continue;
            }
            let mut line = String::new();
            for day in week {
                if day.month() != self.month.month() {
                    line.push_str("    ");
                } else {
                    let marker = if busy.contains_key(day) { '*' } else { ' ' };
                    line.push_str(&format!("{:>3}{marker}", day.day()));
                }
            }
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

impl TimelineSubscriber for MonthView {
    fn range(&self) -> Range {
        days_range(self.grid_start, GRID_DAYS)
    }

    fn add_event(&self, event: &Arc<Event>) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.uid.clone(), event.clone());
    }

    fn update_event(&self, _old: &Arc<Event>, new: &Arc<Event>) {
        self.add_event(new);
    }

    fn remove_event(&self, event: &Arc<Event>) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&event.uid);
    }
}
