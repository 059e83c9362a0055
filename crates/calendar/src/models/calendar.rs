//! Calendar model representing a source of events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a calendar
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarId(pub String);

impl CalendarId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CalendarId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CalendarId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for CalendarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar: a uniquely identified source of events
///
/// The color and read-only flag are display hints for hosts; the timeline
/// never looks at them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: CalendarId,
    pub name: String,
    /// Display color, e.g. "#3584e4"
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub read_only: bool,
}

fn default_color() -> String {
    "#3584e4".to_string()
}

impl Calendar {
    /// Create a writable calendar with the default color
    pub fn new(id: impl Into<CalendarId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: default_color(),
            read_only: false,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
