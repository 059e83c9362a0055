//! Text search over a window around "now"

use chrono::{DateTime, Months, Utc};
use log::debug;
use std::sync::Arc;

use super::SearchModel;
use crate::config::{SearchConfig, TimelineConfig};
use crate::models::{Calendar, CalendarId, Range};
use crate::monitor::MonitorFactory;
use crate::timeline::Timeline;

/// Runs searches on a private timeline
///
/// The engine keeps its own monitors, so searching never disturbs the
/// filter or range of the views' timeline. Calendars must be mirrored into
/// it with [`add_calendar`](Self::add_calendar) and
/// [`remove_calendar`](Self::remove_calendar).
pub struct SearchEngine {
    timeline: Timeline,
    config: SearchConfig,
    model: Option<Arc<SearchModel>>,
}

impl SearchEngine {
    pub fn new(
        factory: Arc<dyn MonitorFactory>,
        timeline_config: TimelineConfig,
        config: SearchConfig,
    ) -> Self {
        Self {
            timeline: Timeline::new(factory, timeline_config),
            config,
            model: None,
        }
    }

    pub fn add_calendar(&mut self, calendar: &Calendar) {
        self.timeline.add_calendar(calendar);
    }

    pub fn remove_calendar(&mut self, id: &CalendarId) {
        self.timeline.remove_calendar(id);
    }

    /// The window searched for a given "now"
    pub fn window(&self, now: DateTime<Utc>) -> Range {
        let months = Months::new(self.config.window_months);
        let start = now.checked_sub_months(months).unwrap_or(now);
        let end = now.checked_add_months(months).unwrap_or(now);
        Range::new(start, end)
    }

    /// Search for `query` in the window around `now`.
    ///
    /// Replaces the previous search; the returned model holds every hit once
    /// the monitors delivered their snapshot.
    pub fn search(&mut self, query: &str, now: DateTime<Utc>) -> Arc<SearchModel> {
        let range = self.window(now);
        debug!("Searching for {query:?} in {range}");

        self.timeline.set_filter(Some(query));

        let model = Arc::new(SearchModel::new(range, query, self.config.max_results));
        self.timeline.add_subscriber(model.clone());
        if let Some(previous) = self.model.replace(model.clone()) {
            self.timeline.remove_subscriber(&previous);
        }
        self.timeline.dispatch_all();

        debug!(
            "Search for {query:?} found {} hit(s), complete: {}",
            model.len(),
            self.timeline.is_complete()
        );
        model
    }

    /// The model of the last search
    pub fn model(&self) -> Option<&Arc<SearchModel>> {
        self.model.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.timeline.is_complete()
    }
}
