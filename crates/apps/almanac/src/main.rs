//! Almanac - A terminal calendar
//!
//! Loads calendars from a JSON file and prints an agenda, a month grid or
//! search results. Every view is fed by a calendar timeline.

use anyhow::{Context, Result};
use calendar::{
    InMemoryMonitorFactory, SearchConfig, SearchEngine, Timeline, TimelineConfig,
    load_calendar_file,
};
use chrono::{Local, NaiveDate, Utc};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

mod views;

use views::{AgendaView, MonthView, render_search_results, start_of_day};

/// Calendar file read when --file is not given
const CALENDAR_FILE: &str = "calendars.json";

#[derive(Parser, Debug)]
#[command(name = "almanac")]
#[command(about = "Print agendas, month grids and search results from a calendar file")]
struct Args {
    /// Calendar file (defaults to calendars.json in the config directory)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// First day to show, as YYYY-MM-DD (defaults to today)
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Number of days in the agenda
    #[arg(long, default_value_t = 7)]
    days: u64,

    /// Search for events matching this text around the date
    #[arg(short, long)]
    search: Option<String>,

    /// Print the month grid above the agenda
    #[arg(short, long)]
    month: bool,
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    if let Err(e) = run(Args::parse()) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let timeline_config = TimelineConfig::load().context("Failed to load timeline settings")?;
    let search_config = SearchConfig::load().context("Failed to load search settings")?;

    let path = match args.file {
        Some(path) => path,
        None => config::config_path(CALENDAR_FILE)
            .context("No config directory to read calendars.json from")?,
    };
    let factory = Arc::new(InMemoryMonitorFactory::new(load_calendar_file(&path)?));
    let calendars = factory.calendars();
    info!("Loaded {} calendar(s) from {}", calendars.len(), path.display());

    let today = args.date.unwrap_or_else(|| Local::now().date_naive());
    let mut out = String::new();

    if let Some(query) = &args.search {
        let mut engine = SearchEngine::new(factory, timeline_config, search_config);
        for calendar in &calendars {
            engine.add_calendar(calendar);
        }

        let now = match args.date {
            Some(date) => start_of_day(date),
            None => Utc::now(),
        };
        let model = engine.search(query, now);
        if !engine.is_complete() {
            warn!("Search finished before every calendar reported");
        }
        render_search_results(&model, &mut out)?;
        print!("{out}");
        return Ok(());
    }

    let mut timeline = Timeline::new(factory, timeline_config);
    timeline.connect_complete_changed(|complete| debug!("Timeline complete: {complete}"));
    for calendar in &calendars {
        timeline.add_calendar(calendar);
    }

    let month = args.month.then(|| Arc::new(MonthView::new(today)));
    if let Some(month) = &month {
        timeline.add_subscriber(month.clone());
    }
    let agenda = Arc::new(AgendaView::new(today, args.days));
    timeline.add_subscriber(agenda.clone());

    let handled = timeline.dispatch_all();
    debug!("Applied {handled} monitor notification(s)");
    if !timeline.is_complete() {
        warn!(
            "Only {} of {} calendar(s) finished loading",
            timeline.completed_count(),
            timeline.calendar_count()
        );
    }

    if let Some(month) = &month {
        month.render(&mut out)?;
        out.push('\n');
    }
    agenda.render(&mut out)?;
    print!("{out}");

    Ok(())
}
