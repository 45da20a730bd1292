use std::fmt;
use std::io::Error;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::dashboard::{LoadResult, TabId};
use crate::render::format_naive_date;
use crate::settings::MAX_REFRESH_SECS;

pub const USERS_RESOURCE: &str = "/api/admin/users";
pub const EXPERIENCES_RESOURCE: &str = "/api/admin/experiences";

pub const DEFAULT_DATE_FORMAT: &str = "%b %-d, %Y";
pub const INVALID_DATE: &str = "Invalid Date";

pub const MAX_TOAST_SECS: u64 = 600;

pub const HELP_TEXT: &str = "\
Navigation
  1-4 / Tab / Shift+Tab   switch tab
  j k / Up Down           move selection
  PgUp PgDn / g G         page / first / last row
  Enter                   show record (settings: edit field)
  Esc                     close popup / cancel input

Table
  /                       search (filters while typing)
  f / F                   cycle first / second facet
  s / S                   sort by name ascending / descending
  x                       clear filters and sort

Data
  r                       refresh current tab
  e                       export snapshot as JSON
  y                       copy selected record to clipboard

  ?                       this help
  q                       quit";

#[derive(Debug)]
pub enum DashError {
    IoError(Error),
    JsonError(serde_json::Error),
    /// Backend unavailable or returned garbage.
    Fetch(String),
    /// Rejected user input. Never mutates state.
    Validation(String),
    /// A record that can not be turned into a display row.
    Render(String),
    Clipboard(String),
    Scheduler(String),
    Config(String),
}

impl fmt::Display for DashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashError::IoError(e) => write!(f, "I/O error: {e}"),
            DashError::JsonError(e) => write!(f, "JSON error: {e}"),
            DashError::Fetch(msg) => write!(f, "Fetch failed: {msg}"),
            DashError::Validation(msg) => write!(f, "Invalid input: {msg}"),
            DashError::Render(msg) => write!(f, "Can not render record: {msg}"),
            DashError::Clipboard(msg) => write!(f, "Clipboard error: {msg}"),
            DashError::Scheduler(msg) => write!(f, "Scheduler error: {msg}"),
            DashError::Config(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for DashError {}

impl From<Error> for DashError {
    fn from(err: Error) -> Self {
        DashError::IoError(err)
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> Self {
        DashError::JsonError(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Setters)]
pub struct DashConfig {
    pub event_poll_time: u64,
    pub data_dir: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub date_format: String,
    pub refresh_interval: Duration,
    pub toast_duration: Duration,
    pub max_toasts: usize,
    pub initial_tab: TabId,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            data_dir: None,
            export_dir: PathBuf::from("."),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            refresh_interval: Duration::from_secs(30),
            toast_duration: Duration::from_secs(4),
            max_toasts: 5,
            initial_tab: TabId::Overview,
        }
    }
}

impl DashConfig {
    pub fn validate(&self) -> Result<(), DashError> {
        if self.event_poll_time == 0 {
            return Err(DashError::Config("poll time must be positive".into()));
        }
        if self.max_toasts == 0 {
            return Err(DashError::Config("at least one toast must fit on screen".into()));
        }
        if self.refresh_interval > Duration::from_secs(MAX_REFRESH_SECS) {
            return Err(DashError::Config(format!(
                "refresh interval must be at most {MAX_REFRESH_SECS}s"
            )));
        }
        if self.toast_duration > Duration::from_secs(MAX_TOAST_SECS) {
            return Err(DashError::Config(format!(
                "toast duration must be at most {MAX_TOAST_SECS}s"
            )));
        }
        if self.date_format.is_empty()
            || StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error))
        {
            return Err(DashError::Config(format!(
                "unknown date format \"{}\"",
                self.date_format
            )));
        }
        // Patterns asking for a time or zone parse fine but can not format a date.
        let renders = NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|sample| format_naive_date(sample, &self.date_format))
            .is_some();
        if !renders {
            return Err(DashError::Config(format!(
                "date format \"{}\" needs more than a date",
                self.date_format
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Search,
    EditSetting,
}

#[derive(Debug)]
pub enum Message {
    Quit,
    NextTab,
    PrevTab,
    SelectTab(TabId),
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Search,
    CycleFacet(usize),
    ClearFilters,
    SortAscending,
    SortDescending,
    Enter,
    Exit,
    Help,
    Export,
    CopyRow,
    Refresh,
    Resize(usize, usize),
    FocusGained,
    FocusLost,
    RawKey(KeyEvent),
    Loaded(LoadResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DashConfig::default().validate().is_ok());
    }

    #[test]
    fn broken_date_format_is_rejected() {
        let cfg = DashConfig::default().date_format("%Q-%Y".to_string());
        assert!(matches!(cfg.validate(), Err(DashError::Config(_))));
    }

    #[test]
    fn time_only_date_format_is_rejected() {
        for format in ["%H:%M", "%b %-d %Y %z", "%T"] {
            let cfg = DashConfig::default().date_format(format.to_string());
            assert!(matches!(cfg.validate(), Err(DashError::Config(_))), "{format}");
        }
        let cfg = DashConfig::default().date_format("%d.%m.%Y".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn intervals_are_bounded() {
        let cfg = DashConfig::default().refresh_interval(Duration::from_secs(u64::MAX));
        assert!(matches!(cfg.validate(), Err(DashError::Config(_))));
        let cfg = DashConfig::default().refresh_interval(Duration::from_secs(MAX_REFRESH_SECS));
        assert!(cfg.validate().is_ok());

        let cfg = DashConfig::default().toast_duration(Duration::from_secs(u64::MAX));
        assert!(matches!(cfg.validate(), Err(DashError::Config(_))));
        let cfg = DashConfig::default().toast_duration(Duration::from_secs(MAX_TOAST_SECS));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn setters_chain() {
        let cfg = DashConfig::default()
            .event_poll_time(250)
            .refresh_interval(Duration::ZERO);
        assert_eq!(cfg.event_poll_time, 250);
        assert_eq!(cfg.refresh_interval, Duration::ZERO);
        assert!(cfg.validate().is_ok());
    }
}
