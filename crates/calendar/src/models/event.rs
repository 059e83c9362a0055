//! Event model representing a single calendar entry

use super::{CalendarId, Range};
use serde::{Deserialize, Serialize};

/// A calendar event
///
/// Events are immutable once built and are shared as `Arc<Event>`. Editing an
/// event (rescheduling, renaming) produces a new value with the same `uid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique across all calendars, e.g. "<calendar-id>:<event-id>[:<recurrence-id>]"
    pub uid: String,
    /// Calendar this event belongs to
    pub calendar_id: CalendarId,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// When the event happens
    pub range: Range,
    #[serde(default)]
    pub all_day: bool,
}

impl Event {
    /// Create a new event builder
    pub fn builder(
        uid: impl Into<String>,
        calendar_id: impl Into<CalendarId>,
        range: Range,
    ) -> EventBuilder {
        EventBuilder::new(uid.into(), calendar_id.into(), range)
    }

    pub fn range(&self) -> Range {
        self.range
    }

    /// A copy of this event moved to `range`
    pub fn rescheduled(&self, range: Range) -> Event {
        Event {
            range,
            ..self.clone()
        }
    }

    /// Case-insensitive text match against summary, description and location.
    ///
    /// An empty query matches everything.
    pub fn matches_text(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        [
            Some(self.summary.as_str()),
            self.description.as_deref(),
            self.location.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(&query))
    }
}

/// Builder for creating Event instances
pub struct EventBuilder {
    uid: String,
    calendar_id: CalendarId,
    range: Range,
    summary: String,
    description: Option<String>,
    location: Option<String>,
    all_day: bool,
}

impl EventBuilder {
    fn new(uid: String, calendar_id: CalendarId, range: Range) -> Self {
        Self {
            uid,
            calendar_id,
            range,
            summary: String::new(),
            description: None,
            location: None,
            all_day: false,
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    pub fn build(self) -> Event {
        Event {
            uid: self.uid,
            calendar_id: self.calendar_id,
            summary: self.summary,
            description: self.description,
            location: self.location,
            range: self.range,
            all_day: self.all_day,
        }
    }
}
