//! Search results - one line per hit

use calendar::SearchModel;
use std::fmt;

pub fn render_search_results(model: &SearchModel, out: &mut impl fmt::Write) -> fmt::Result {
    let hits = model.hits();
    if hits.is_empty() {
        return writeln!(out, "No events match \"{}\"", model.query());
    }

    writeln!(out, "{} event(s) match \"{}\"", hits.len(), model.query())?;
    for hit in &hits {
        write!(
            out,
            "  {}  {}",
            hit.range().start().format("%Y-%m-%d %H:%M"),
            hit.summary
        )?;
        if let Some(location) = &hit.location {
            write!(out, " @ {location}")?;
        }
        writeln!(out, " [{}]", hit.calendar_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calendar::{Event, Range, TimelineSubscriber};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    #[test]
    fn test_render_hits() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 30, 0).unwrap();
        let window = Range::starting_at(start - Duration::days(30), Duration::days(60));
        let model = SearchModel::new(window, "dent", 10);
        model.add_event(&Arc::new(
            Event::builder("d", "home", Range::starting_at(start, Duration::hours(1)))
                .summary("Dentist")
                .location("Main St")
                .build(),
        ));

        let mut out = String::new();
        render_search_results(&model, &mut out).unwrap();
        assert_eq!(
            out,
            "1 event(s) match \"dent\"\n  2024-03-04 08:30  Dentist @ Main St [home]\n"
        );
    }

    #[test]
    fn test_render_no_hits() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let model = SearchModel::new(Range::starting_at(start, Duration::days(1)), "gym", 10);

        let mut out = String::new();
        render_search_results(&model, &mut out).unwrap();
        assert_eq!(out, "No events match \"gym\"\n");
    }
}
