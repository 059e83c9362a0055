//! Agenda view - events listed day by day

use calendar::{Event, Range, TimelineSubscriber};
use chrono::{Days, NaiveDate};
use log::trace;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::days_range;

/// Lists the events of a run of consecutive days
pub struct AgendaView {
    first_day: NaiveDate,
    days: u64,
    events: RwLock<HashMap<String, Arc<Event>>>,
}

impl AgendaView {
    pub fn new(first_day: NaiveDate, days: u64) -> Self {
        Self {
            first_day,
            days: days.max(1),
            events: RwLock::new(HashMap::new()),
        }
    }

    /// Events currently shown, by start time then summary
    pub fn events(&self) -> Vec<Arc<Event>> {
        let mut events: Vec<_> = self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.range()
                .cmp(&b.range())
                .then_with(|| a.summary.cmp(&b.summary))
        });
        events
    }

    pub fn render(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let events = self.events();

        for offset in 0..self.days {
            let Some(date) = self.first_day.checked_add_days(Days::new(offset)) else {
                break;
            };
            let day = days_range(date, 1);
            writeln!(out, "{}", date.format("%a %Y-%m-%d"))?;

            let mut empty = true;
            for event in events.iter().filter(|e| e.range().intersects(&day)) {
                empty = false;
                write!(out, "  {}  {}", time_label(event, &day), event.summary)?;
                if let Some(location) = &event.location {
                    write!(out, " @ {location}")?;
                }
                writeln!(out, " [{}]", event.calendar_id)?;
            }
            if empty {
                writeln!(out, "  (no events)")?;
            }
        }
        Ok(())
    }
}

/// "09:00-10:00", with ".." where the event runs past the day
fn time_label(event: &Event, day: &Range) -> String {
    let range = event.range();
    if event.all_day || (range.start() <= day.start() && range.end() >= day.end()) {
        return format!("{:<11}", "all day");
    }

    let start = if range.start() < day.start() {
        "..".to_string()
    } else {
        range.start().format("%H:%M").to_string()
    };
    let end = if range.end() > day.end() {
        "..".to_string()
    } else {
        range.end().format("%H:%M").to_string()
    };
    format!("{start:>5}-{end:<5}")
}

impl TimelineSubscriber for AgendaView {
    fn range(&self) -> Range {
        days_range(self.first_day, self.days)
    }

    fn add_event(&self, event: &Arc<Event>) {
        trace!("Agenda showing '{}'", event.summary);
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.uid.clone(), event.clone());
    }

    fn update_event(&self, _old: &Arc<Event>, new: &Arc<Event>) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(new.uid.clone(), new.clone());
    }

    fn remove_event(&self, event: &Arc<Event>) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&event.uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn make_event(uid: &str, summary: &str, day: u32, hour: u32, hours: i64) -> Arc<Event> {
        let start = Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap();
        Arc::new(
            Event::builder(uid, "work", Range::starting_at(start, Duration::hours(hours)))
                .summary(summary)
                .build(),
        )
    }

    fn rendered(view: &AgendaView) -> String {
        let mut out = String::new();
        view.render(&mut out).unwrap();
        out
    }

    #[test]
    fn test_range_covers_whole_days() {
        let view = AgendaView::new(date(8), 7);
        let range = view.range();
        assert_eq!(range.start(), Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap());
        assert_eq!(range.end(), Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_render_groups_by_day() {
        let view = AgendaView::new(date(8), 2);
        view.add_event(&make_event("b", "Review", 8, 14, 1));
        view.add_event(&make_event("a", "Planning", 8, 9, 1));

        assert_eq!(
            rendered(&view),
            "Mon 2024-01-08\n\
             \x20 09:00-10:00  Planning [work]\n\
             \x20 14:00-15:00  Review [work]\n\
             Tue 2024-01-09\n\
             \x20 (no events)\n"
        );
    }

    #[test]
    fn test_event_spanning_midnight_shows_on_both_days() {
        let view = AgendaView::new(date(8), 2);
        view.add_event(&make_event("n", "Night shift", 8, 22, 4));

        let out = rendered(&view);
        assert!(out.contains("22:00-..     Night shift"));
        assert!(out.contains("   ..-02:00  Night shift"));
    }

    #[test]
    fn test_update_and_remove() {
        let view = AgendaView::new(date(8), 1);
        let first = make_event("a", "Planning", 8, 9, 1);
        view.add_event(&first);

        let moved = make_event("a", "Planning", 8, 11, 1);
        view.update_event(&first, &moved);
        assert_eq!(view.events().len(), 1);
        assert!(rendered(&view).contains("11:00-12:00"));

        view.remove_event(&moved);
        assert!(view.events().is_empty());
        assert!(rendered(&view).contains("(no events)"));
    }

    #[test]
    fn test_all_day_label() {
        let view = AgendaView::new(date(8), 1);
        let start = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        let holiday = Event::builder("h", "home", Range::starting_at(start, Duration::days(1)))
            .summary("Holiday")
            .all_day(true)
            .build();
        view.add_event(&Arc::new(holiday));

        assert!(rendered(&view).contains("  all day      Holiday [home]"));
    }
}
