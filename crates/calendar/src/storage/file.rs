//! Loading calendars from JSON files
//!
//! ```json
//! {
//!   "calendars": [
//!     {
//!       "id": "work",
//!       "name": "Work",
//!       "color": "#e01b24",
//!       "events": [
//!         { "uid": "work:1", "summary": "Standup",
//!           "start": "2024-01-10T09:00:00Z", "end": "2024-01-10T09:15:00Z" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::InMemoryCalendarStore;
use crate::models::{Calendar, Event, Range};

#[derive(Debug, Deserialize)]
struct CalendarFile {
    #[serde(default)]
    calendars: Vec<CalendarEntry>,
}

#[derive(Debug, Deserialize)]
struct CalendarEntry {
    #[serde(flatten)]
    calendar: Calendar,
    #[serde(default)]
    events: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    uid: String,
    #[serde(default)]
    summary: String,
    description: Option<String>,
    location: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    all_day: bool,
}

impl EventEntry {
    fn into_event(self, calendar: &Calendar) -> Result<Event> {
        let range = Range::try_new(self.start, self.end)
            .with_context(|| format!("Invalid range for event {}", self.uid))?;

        let mut builder = Event::builder(self.uid, calendar.id.clone(), range)
            .summary(self.summary)
            .all_day(self.all_day);
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        if let Some(location) = self.location {
            builder = builder.location(location);
        }
        Ok(builder.build())
    }
}

/// Parse a calendar document into one store per calendar
pub fn parse_calendars(json: &str) -> Result<Vec<Arc<InMemoryCalendarStore>>> {
    let file: CalendarFile = serde_json::from_str(json).context("Failed to parse calendar JSON")?;

    let mut stores = Vec::with_capacity(file.calendars.len());
    for entry in file.calendars {
        let store = InMemoryCalendarStore::new(entry.calendar);
        for event in entry.events {
            let event = event.into_event(store.calendar())?;
            store
                .upsert_event(event)
                .with_context(|| format!("Failed to store event in {}", store.calendar().id))?;
        }
        stores.push(Arc::new(store));
    }
    Ok(stores)
}

/// Read a calendar document from disk
pub fn load_calendar_file(path: &Path) -> Result<Vec<Arc<InMemoryCalendarStore>>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read calendar file: {}", path.display()))?;
    let stores = parse_calendars(&contents)
        .with_context(|| format!("Failed to load calendar file: {}", path.display()))?;

    info!(
        "Loaded {} calendar(s) with {} event(s) from {}",
        stores.len(),
        stores.iter().map(|s| s.count_events()).sum::<usize>(),
        path.display()
    );
    Ok(stores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r##"{
        "calendars": [
            {
                "id": "work",
                "name": "Work",
                "color": "#e01b24",
                "events": [
                    { "uid": "work:1", "summary": "Standup", "location": "Room 1",
                      "start": "2024-01-10T09:00:00Z", "end": "2024-01-10T09:15:00Z" },
                    { "uid": "work:2", "summary": "Offsite", "all_day": true,
                      "start": "2024-01-12T00:00:00Z", "end": "2024-01-13T00:00:00Z" }
                ]
            },
            { "id": "home", "name": "Home", "read_only": true }
        ]
    }"##;

    #[test]
    fn test_parse_calendars() {
        let stores = parse_calendars(SAMPLE).unwrap();
        assert_eq!(stores.len(), 2);

        let work = &stores[0];
        assert_eq!(work.calendar().color, "#e01b24");
        assert_eq!(work.count_events(), 2);
        let standup = work.get_event("work:1").unwrap();
        assert_eq!(standup.location.as_deref(), Some("Room 1"));
        assert_eq!(standup.calendar_id.as_str(), "work");
        assert!(work.get_event("work:2").unwrap().all_day);

        let home = &stores[1];
        assert!(home.calendar().read_only);
        assert_eq!(home.calendar().color, "#3584e4");
        assert_eq!(home.count_events(), 0);
    }

    #[test]
    fn test_inverted_event_is_an_error() {
        let json = r#"{ "calendars": [ { "id": "c", "name": "C", "events": [
            { "uid": "c:1", "start": "2024-01-10T10:00:00Z", "end": "2024-01-10T09:00:00Z" }
        ] } ] }"#;

        let err = parse_calendars(json).unwrap_err();
        assert!(format!("{err:#}").contains("c:1"));
    }

    #[test]
    fn test_load_calendar_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calendars.json");
        fs::write(&path, SAMPLE).unwrap();

        let stores = load_calendar_file(&path).unwrap();
        assert_eq!(stores.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_calendar_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read calendar file"));
    }
}
