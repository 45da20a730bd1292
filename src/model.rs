use std::time::{Duration, Instant};

use arboard::Clipboard;
use chrono::Utc;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace, warn};

use crate::dashboard::{Dashboard, LoadRequest, LoadResult, TabId};
use crate::domain::{CMDMode, DashConfig, DashError, HELP_TEXT, Message, Severity};
use crate::export::{snapshot, write_export};
use crate::inputter::{InputResult, Inputter};
use crate::scheduler::{Scheduler, TaskId, TaskKind};
use crate::settings::{SettingField, Settings};
use crate::table::{SortOrder, TableController};
use crate::toast::ToastStack;

// Rows taken by header, tabs, metrics, filter bar and status line.
const CHROME_HEIGHT: usize = 14;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    DASHBOARD,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub title: String,
    pub body: String,
}

pub struct Model {
    config: DashConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    dashboard: Dashboard,
    settings: Settings,
    settings_cursor: usize,
    toasts: ToastStack,
    scheduler: Scheduler,
    refresh_task: Option<TaskId>,
    focused: bool,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    popup: Option<Popup>,
    clipboard: Option<Clipboard>,
    status_message: String,
    pending_loads: Vec<LoadRequest>,
    ui_height: usize,
}

impl Model {
    pub fn init(config: &DashConfig) -> Result<Self, DashError> {
        config.validate()?;
        let settings = Settings {
            refresh_interval_secs: config.refresh_interval.as_secs(),
            ..Settings::default()
        };
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::DASHBOARD,
            previous_modus: Modus::DASHBOARD,
            dashboard: Dashboard::new(&config.date_format),
            settings,
            settings_cursor: 0,
            toasts: ToastStack::new(config.toast_duration, config.max_toasts),
            scheduler: Scheduler::new(),
            refresh_task: None,
            focused: true,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            popup: None,
            clipboard: None,
            status_message: "Started showroom-admin!".to_string(),
            pending_loads: Vec::new(),
            ui_height: 0,
        };
        model.schedule_refresh(Instant::now());
        model.switch_tab(config.initial_tab);
        Ok(model)
    }

    // -------------------- Accessors for the ui ---------------------- //

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_cursor(&self) -> usize {
        self.settings_cursor
    }

    pub fn toasts(&self) -> &ToastStack {
        &self.toasts
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn cmd_input(&self) -> Option<(CMDMode, &InputResult)> {
        match self.modus {
            Modus::CMDINPUT => self.cmd_mode.map(|mode| (mode, &self.last_input)),
            _ => None,
        }
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    /// Loads requested since the last call. The caller hands them to the loader.
    pub fn take_loads(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.pending_loads)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Stops every timer. Called once on exit.
    pub fn shutdown(&mut self) {
        if !self.scheduler.is_empty() {
            info!("Stopping {} timers", self.scheduler.len());
        }
        self.scheduler.shutdown();
        self.refresh_task = None;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    // -------------------- Update ---------------------- //

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DashError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);

        // Messages that do not depend on what the user is looking at.
        let msg = match msg {
            Message::Loaded(result) => {
                self.apply_load(result);
                return Ok(());
            }
            Message::FocusGained => {
                self.focus_changed(true, Instant::now());
                return Ok(());
            }
            Message::FocusLost => {
                self.focus_changed(false, Instant::now());
                return Ok(());
            }
            Message::Resize(_width, height) => {
                self.ui_height = height;
                return Ok(());
            }
            other => other,
        };

        match self.modus {
            Modus::DASHBOARD => match msg {
                Message::Quit => self.quit(),
                Message::NextTab => self.step_tab(1),
                Message::PrevTab => self.step_tab(TabId::ALL.len() - 1),
                Message::SelectTab(tab) => self.switch_tab(tab),
                Message::MoveUp => self.move_selection(|t| t.select_up(1), -1),
                Message::MoveDown => self.move_selection(|t| t.select_down(1), 1),
                Message::MovePageUp => {
                    let page = self.page_size();
                    self.move_selection(|t| t.select_up(page), -(page as isize))
                }
                Message::MovePageDown => {
                    let page = self.page_size();
                    self.move_selection(|t| t.select_down(page), page as isize)
                }
                Message::MoveBeginning => self.move_selection(|t| t.select_first(), isize::MIN),
                Message::MoveEnd => self.move_selection(|t| t.select_last(), isize::MAX),
                Message::Search => self.enter_search(),
                Message::CycleFacet(idx) => self.with_table(|t| t.cycle_facet(idx)),
                Message::ClearFilters => self.with_table(|t| t.clear_filters()),
                Message::SortAscending => self.with_table(|t| t.sort_by_title(SortOrder::Ascending)),
                Message::SortDescending => {
                    self.with_table(|t| t.sort_by_title(SortOrder::Descending))
                }
                Message::Enter => self.enter(),
                Message::Exit => self.dismiss_toast(),
                Message::Help => self.show_popup("Help", HELP_TEXT.to_string()),
                Message::Export => self.export(),
                Message::CopyRow => self.copy_selected_record(),
                Message::Refresh => self.refresh(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.close_popup(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
        Ok(())
    }

    /// Expires toasts and runs due timers.
    pub fn tick(&mut self, now: Instant) {
        self.toasts.expire(now);
        for kind in self.scheduler.due(now) {
            match kind {
                TaskKind::RefreshActiveTab => {
                    let busy = self
                        .dashboard
                        .active_page()
                        .is_some_and(|p| p.tables.iter().any(TableController::is_loading));
                    if !self.focused || busy {
                        trace!("Skipping refresh (focused: {}, busy: {busy})", self.focused);
                    } else {
                        debug!("Periodic refresh");
                        let loads = self.dashboard.refresh_active();
                        self.pending_loads.extend(loads);
                    }
                }
            }
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn apply_load(&mut self, result: LoadResult) {
        self.dashboard.apply_load(result, &mut self.toasts);
    }

    fn focus_changed(&mut self, focused: bool, now: Instant) {
        trace!("Terminal focus changed: {focused}");
        self.focused = focused;
        if let Some(id) = self.refresh_task {
            if focused {
                self.scheduler.resume(id, now);
            } else {
                self.scheduler.pause(id);
            }
        }
    }

    fn schedule_refresh(&mut self, now: Instant) {
        if let Some(id) = self.refresh_task.take() {
            self.scheduler.cancel(id);
        }
        let secs = self.settings.refresh_interval_secs;
        if secs == 0 {
            info!("Periodic refresh disabled");
            return;
        }
        match self
            .scheduler
            .every(TaskKind::RefreshActiveTab, Duration::from_secs(secs), now)
        {
            Ok(id) => {
                if !self.focused {
                    self.scheduler.pause(id);
                }
                self.refresh_task = Some(id);
            }
            Err(e) => {
                warn!("Can not schedule refresh: {e}");
                self.toasts.push(e.to_string(), Severity::Warning, now);
            }
        }
    }

    fn switch_tab(&mut self, tab: TabId) {
        let loads = self.dashboard.activate(tab);
        self.pending_loads.extend(loads);
        self.set_status_message(format!("{} ({})", tab.label(), tab.index() + 1));
    }

    fn step_tab(&mut self, step: usize) {
        let current = self.dashboard.active_tab().map(TabId::index).unwrap_or(0);
        let next = (current + step) % TabId::ALL.len();
        if let Some(tab) = TabId::from_index(next) {
            self.switch_tab(tab);
        }
    }

    fn page_size(&self) -> usize {
        self.ui_height.saturating_sub(CHROME_HEIGHT).max(1)
    }

    fn on_settings_tab(&self) -> bool {
        self.dashboard.active_tab() == Some(TabId::Settings)
    }

    fn with_table(&mut self, f: impl FnOnce(&mut TableController)) {
        if let Some(table) = self.dashboard.focused_table_mut() {
            f(table);
        }
    }

    /// Moves the table selection, or the settings cursor by `step` (saturating).
    fn move_selection(&mut self, f: impl FnOnce(&mut TableController), step: isize) {
        if self.on_settings_tab() {
            let last = SettingField::ALL.len() - 1;
            self.settings_cursor = self.settings_cursor.saturating_add_signed(step).min(last);
        } else {
            self.with_table(f);
        }
    }

    fn enter(&mut self) {
        if self.on_settings_tab() {
            let field = SettingField::ALL[self.settings_cursor];
            let current = self.settings.value(field);
            self.enter_cmd_mode(CMDMode::EditSetting, &current);
            return;
        }
        let record = self
            .dashboard
            .focused_table()
            .and_then(|t| t.selected_record())
            .map(|r| (r.id.clone(), serde_json::to_string_pretty(r)));
        match record {
            Some((id, Ok(body))) => self.show_popup(&format!("Record {id}"), body),
            Some((id, Err(e))) => warn!("Can not show record {id}: {e}"),
            None => trace!("Nothing selected"),
        }
    }

    fn show_popup(&mut self, title: &str, body: String) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup = Some(Popup {
            title: title.to_string(),
            body,
        });
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.popup = None;
    }

    fn dismiss_toast(&mut self) {
        let newest = self.toasts.visible().last().map(|t| t.id);
        if let Some(id) = newest {
            self.toasts.dismiss(id);
        }
    }

    fn enter_search(&mut self) {
        let current = match self.dashboard.focused_table() {
            Some(table) => table.filter_state().search_text.clone(),
            None => return,
        };
        self.enter_cmd_mode(CMDMode::Search, &current);
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode, prefill: &str) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.last_input = self.input.start(prefill);
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.cmd_mode == Some(CMDMode::Search) {
            // The table follows every keystroke.
            let text = self.last_input.input.clone();
            self.with_table(|t| t.set_search(&text));
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode.take() {
            Some(CMDMode::Search) => {
                let shown = self
                    .dashboard
                    .focused_table()
                    .map(|t| t.rows().len())
                    .unwrap_or(0);
                self.set_status_message(format!("{shown} matching rows"));
            }
            Some(CMDMode::EditSetting) if !self.last_input.canceled => {
                self.apply_setting(&cmd_input, Instant::now());
            }
            Some(CMDMode::EditSetting) => self.set_status_message("Edit canceled"),
            None => debug!("Cmd mode is none!"),
        }
    }

    fn apply_setting(&mut self, input: &str, now: Instant) {
        let field = SettingField::ALL[self.settings_cursor];
        let interval_before = self.settings.refresh_interval_secs;
        match self.settings.apply(field, input) {
            Ok(()) => {
                info!("Setting {:?} changed", field);
                self.set_status_message(format!("{} saved", field.label()));
                self.toasts
                    .push(format!("{} updated", field.label()), Severity::Success, now);
                if self.settings.refresh_interval_secs != interval_before {
                    self.schedule_refresh(now);
                }
            }
            Err(e) => {
                self.set_status_message(e.to_string());
                self.toasts.push(e.to_string(), Severity::Error, now);
            }
        }
    }

    fn refresh(&mut self) {
        let loads = self.dashboard.refresh_active();
        if loads.is_empty() {
            self.set_status_message("Nothing to refresh");
        } else {
            self.set_status_message("Refreshing ...");
            debug!("Refresh issued ticket {}", self.dashboard.ticket());
        }
        self.pending_loads.extend(loads);
    }

    fn export(&mut self) {
        let now = Utc::now();
        let doc = snapshot(&self.dashboard, &self.settings, now);
        let outcome = write_export(&doc, &self.config.export_dir, now);
        match outcome {
            Ok(path) => {
                let message = format!("Exported to {}", path.display());
                self.set_status_message(message.clone());
                self.toasts.push(message, Severity::Success, Instant::now());
            }
            Err(e) => {
                self.toasts
                    .push(format!("Export failed: {e}"), Severity::Error, Instant::now());
            }
        }
    }

    fn copy_selected_record(&mut self) {
        let text = match self.dashboard.focused_table().and_then(|t| t.selected_record()) {
            Some(record) => serde_json::to_string_pretty(record),
            None => return,
        };
        let outcome = text
            .map_err(DashError::from)
            .and_then(|text| self.copy_to_clipboard(text));
        match outcome {
            Ok(()) => self.toasts.push("Copied record to clipboard", Severity::Info, Instant::now()),
            Err(e) => self.toasts.push(e.to_string(), Severity::Warning, Instant::now()),
        };
    }

    fn copy_to_clipboard(&mut self, text: String) -> Result<(), DashError> {
        let mut clipboard = match self.clipboard.take() {
            Some(clipboard) => clipboard,
            None => Clipboard::new().map_err(|e| DashError::Clipboard(e.to_string()))?,
        };
        let result = clipboard
            .set_text(text)
            .map_err(|e| DashError::Clipboard(e.to_string()));
        self.clipboard = Some(clipboard);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EXPERIENCES_RESOURCE, USERS_RESOURCE};
    use crate::record::fallback_records;
    use crate::table::{LoadState, TableState};
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn model() -> Model {
        Model::init(&DashConfig::default().initial_tab(TabId::Users)).unwrap()
    }

    fn deliver(model: &mut Model, records_for: impl Fn(&str) -> Option<Vec<crate::record::Record>>) {
        for request in model.take_loads() {
            let outcome = match records_for(request.resource) {
                Some(records) => Ok(Some(records)),
                None => Err(DashError::Fetch("unreachable".into())),
            };
            model
                .update(Some(Message::Loaded(LoadResult { request, outcome })))
                .unwrap();
        }
    }

    fn key(model: &mut Model, code: KeyCode) {
        let event = KeyEvent::new(code, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(event))).unwrap();
    }

    fn users_table(model: &Model) -> &TableController {
        model.dashboard().focused_table().unwrap()
    }

    #[test]
    fn failed_initial_load_shows_sample_users_and_one_error() {
        let mut model = model();
        deliver(&mut model, |_| None);
        let table = users_table(&model);
        assert_eq!(table.rows().len(), 4);
        assert_eq!(table.load_state(), LoadState::Fallback);
        let errors: Vec<_> = model
            .toasts()
            .visible()
            .filter(|t| t.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unusable_config_fails_init_instead_of_panicking() {
        let time_only = DashConfig::default()
            .initial_tab(TabId::Users)
            .date_format("%H:%M".to_string());
        assert!(matches!(Model::init(&time_only), Err(DashError::Config(_))));

        let endless = DashConfig::default().refresh_interval(Duration::from_secs(u64::MAX));
        assert!(matches!(Model::init(&endless), Err(DashError::Config(_))));

        let sticky = DashConfig::default().toast_duration(Duration::from_secs(u64::MAX));
        assert!(matches!(Model::init(&sticky), Err(DashError::Config(_))));
    }

    #[test]
    fn search_filters_while_typing() {
        let mut model = model();
        deliver(&mut model, |r| Some(fallback_records(r)));

        model.update(Some(Message::Search)).unwrap();
        assert!(model.raw_keyevents());
        for c in "SAR".chars() {
            key(&mut model, KeyCode::Char(c));
        }
        assert_eq!(users_table(&model).state(), TableState::Filtered);
        assert_eq!(users_table(&model).rows().len(), 1);

        key(&mut model, KeyCode::Enter);
        assert!(!model.raw_keyevents());
        assert_eq!(users_table(&model).rows()[0].title, "Sarah Johnson");

        // Escape in a new search clears the box again.
        model.update(Some(Message::Search)).unwrap();
        assert_eq!(model.cmd_input().unwrap().1.input, "SAR");
        key(&mut model, KeyCode::Esc);
        assert_eq!(users_table(&model).state(), TableState::Idle);
        assert_eq!(users_table(&model).rows().len(), 4);
    }

    #[test]
    fn tab_switch_discards_and_reloads() {
        let mut model = model();
        deliver(&mut model, |r| Some(fallback_records(r)));
        model.update(Some(Message::NextTab)).unwrap();
        assert_eq!(model.dashboard().active_tab(), Some(TabId::Experiences));
        let loads = model.take_loads();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].resource, EXPERIENCES_RESOURCE);
        assert!(model.dashboard().page(TabId::Users).tables[0].records().is_empty());

        model.update(Some(Message::SelectTab(TabId::Experiences))).unwrap();
        assert!(model.take_loads().is_empty());

        model.update(Some(Message::PrevTab)).unwrap();
        let loads = model.take_loads();
        assert_eq!(loads[0].resource, USERS_RESOURCE);
    }

    #[test]
    fn invalid_setting_is_rejected_without_mutation() {
        let mut model = model();
        model.update(Some(Message::SelectTab(TabId::Settings))).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.settings_cursor(), 1);

        let before = model.settings().clone();
        model.update(Some(Message::Enter)).unwrap();
        assert_eq!(model.cmd_input().unwrap().0, CMDMode::EditSetting);
        key(&mut model, KeyCode::Char('x'));
        key(&mut model, KeyCode::Enter);

        assert_eq!(model.settings(), &before);
        assert!(
            model
                .toasts()
                .visible()
                .any(|t| t.severity == Severity::Error)
        );
        assert!(model.status_message().starts_with("Invalid input"));
    }

    #[test]
    fn valid_setting_is_saved() {
        let mut model = model();
        model.update(Some(Message::SelectTab(TabId::Settings))).unwrap();
        model.update(Some(Message::MoveEnd)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        key(&mut model, KeyCode::Backspace);
        key(&mut model, KeyCode::Backspace);
        key(&mut model, KeyCode::Char('5'));
        key(&mut model, KeyCode::Enter);
        assert_eq!(model.settings().refresh_interval_secs, 5);
    }

    #[test]
    fn refresh_timer_respects_focus() {
        let mut model = model();
        deliver(&mut model, |r| Some(fallback_records(r)));
        let later = Instant::now() + Duration::from_secs(31);

        model.update(Some(Message::FocusLost)).unwrap();
        model.tick(later);
        assert!(model.take_loads().is_empty());

        model.update(Some(Message::FocusGained)).unwrap();
        model.tick(Instant::now() + Duration::from_secs(61));
        let loads = model.take_loads();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].resource, USERS_RESOURCE);

        // Still in flight: the next period is skipped.
        model.tick(Instant::now() + Duration::from_secs(200));
        assert!(model.take_loads().is_empty());

        model.shutdown();
        deliver(&mut model, |r| Some(fallback_records(r)));
        model.tick(Instant::now() + Duration::from_secs(1000));
        assert!(model.take_loads().is_empty());
    }

    #[test]
    fn popup_shows_selected_record() {
        let mut model = model();
        deliver(&mut model, |r| Some(fallback_records(r)));
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        let popup = model.popup().unwrap();
        assert_eq!(popup.title, "Record 2");
        assert!(popup.body.contains("sarah@realestate.com"));

        // Load results are applied even while a popup is open.
        model.refresh();
        deliver(&mut model, |_| None);
        assert_eq!(users_table(&model).load_state(), LoadState::Live);
        assert!(
            model
                .toasts()
                .visible()
                .any(|t| t.severity == Severity::Warning)
        );

        model.update(Some(Message::Exit)).unwrap();
        assert!(model.popup().is_none());
    }

    #[test]
    fn export_writes_into_the_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DashConfig::default().export_dir(dir.path().to_path_buf());
        let mut model = Model::init(&cfg).unwrap();
        model.update(Some(Message::Export)).unwrap();
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert!(model.status_message().starts_with("Exported to"));
    }
}
