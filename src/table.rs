use std::collections::HashSet;

use tracing::{debug, info, trace, warn};

use crate::domain::{DashError, Severity};
use crate::filter::{FilterState, filter};
use crate::record::{Record, fallback_records};
use crate::render::{DisplayRow, render};
use crate::schema::TableSchema;
use crate::toast::ToastSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Idle,
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Live,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Outcome of reconciling the previous row set with a new one by key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowDiff {
    pub kept: usize,
    pub inserted: usize,
    pub removed: usize,
}

pub struct TableController {
    schema: &'static TableSchema,
    date_format: String,
    records: Vec<Record>,
    filter: FilterState,
    sort: Option<SortOrder>,
    rows: Vec<DisplayRow>,
    state: TableState,
    load: LoadState,
    in_flight: bool,
    selected: usize,
    last_diff: RowDiff,
}

impl TableController {
    pub fn new(schema: &'static TableSchema, date_format: &str) -> Self {
        Self {
            schema,
            date_format: date_format.to_string(),
            records: Vec::new(),
            filter: FilterState::default(),
            sort: None,
            rows: Vec::new(),
            state: TableState::Idle,
            load: LoadState::Unloaded,
            in_flight: false,
            selected: 0,
            last_diff: RowDiff::default(),
        }
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn rows(&self) -> &[DisplayRow] {
        &self.rows
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    pub fn load_state(&self) -> LoadState {
        self.load
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn sort(&self) -> Option<SortOrder> {
        self.sort
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn last_diff(&self) -> RowDiff {
        self.last_diff
    }

    pub fn selected_record(&self) -> Option<&Record> {
        let key = &self.rows.get(self.selected)?.key;
        self.records.iter().find(|r| &r.id == key)
    }

    // -------------------- Loading ---------------------- //

    pub fn begin_loading(&mut self) {
        if self.load == LoadState::Unloaded {
            self.load = LoadState::Loading;
        }
        self.in_flight = true;
    }

    /// Applies a fetch outcome. Never leaves the table blank because of a
    /// failing source: the first failure swaps in the fallback set.
    pub fn apply_fetch(&mut self, outcome: Result<Option<Vec<Record>>, DashError>, sink: &mut dyn ToastSink) {
        self.in_flight = false;
        let name = self.schema.name;
        match outcome {
            Ok(Some(records)) => {
                info!("Loaded {} {name} records", records.len());
                self.records = records;
                self.load = LoadState::Live;
            }
            failure => {
                let reason = match failure {
                    Err(e) => e.to_string(),
                    _ => "source returned no data".to_string(),
                };
                match self.load {
                    LoadState::Live => {
                        warn!("Refreshing {name} failed: {reason}");
                        sink.show_toast(
                            &format!("Refreshing {name} failed, keeping last loaded data"),
                            Severity::Warning,
                        );
                    }
                    LoadState::Fallback => {
                        debug!("Refreshing {name} failed again: {reason}");
                    }
                    LoadState::Unloaded | LoadState::Loading => {
                        warn!("Loading {name} failed, using sample data: {reason}");
                        self.records = fallback_records(self.schema.resource);
                        self.load = LoadState::Fallback;
                        sink.show_toast(
                            &format!("Could not load {name}, showing sample data"),
                            Severity::Error,
                        );
                    }
                }
            }
        }
        self.refresh();
    }

    /// Drops the records, e.g. when navigating away from the tab.
    pub fn unload(&mut self) {
        self.records.clear();
        self.load = LoadState::Unloaded;
        self.in_flight = false;
        self.refresh();
    }

    // -------------------- Filter inputs ---------------------- //

    pub fn set_search(&mut self, text: &str) {
        if self.filter.search_text != text {
            self.filter.search_text = text.to_string();
            self.refresh();
        }
    }

    pub fn set_facet(&mut self, field: &str, value: &str) {
        self.filter.facets.insert(field.to_string(), value.to_string());
        self.refresh();
    }

    /// Steps facet `idx` through "" and its options.
    pub fn cycle_facet(&mut self, idx: usize) {
        let Some(facet) = self.schema.facets.get(idx) else {
            return;
        };
        let current = self.filter.facet(facet.field);
        let next = match facet.options.iter().position(|o| *o == current) {
            Some(pos) if pos + 1 < facet.options.len() => facet.options[pos + 1],
            Some(_) => "",
            None if current.is_empty() => facet.options.first().copied().unwrap_or(""),
            None => "",
        };
        self.set_facet(facet.field, next);
    }

    pub fn clear_filters(&mut self) {
        self.filter = FilterState::default();
        self.sort = None;
        self.refresh();
    }

    pub fn sort_by_title(&mut self, order: SortOrder) {
        self.sort = Some(order);
        self.refresh();
    }

    /// Republishes the table: filter, render, sort, reconcile.
    pub fn refresh(&mut self) {
        self.state = if self.filter.is_empty() {
            TableState::Idle
        } else {
            TableState::Filtered
        };
        let visible = filter(&self.records, &self.filter, self.schema.search_fields);
        let mut rows = render(self.schema, visible, &self.date_format);
        match self.sort {
            Some(SortOrder::Ascending) => rows.sort_by_key(|r| r.title.to_lowercase()),
            Some(SortOrder::Descending) => {
                rows.sort_by_key(|r| std::cmp::Reverse(r.title.to_lowercase()))
            }
            None => {}
        }
        self.reconcile(rows);
    }

    fn reconcile(&mut self, rows: Vec<DisplayRow>) {
        let selected_key = self.rows.get(self.selected).map(|r| r.key.clone());
        let previous: HashSet<&str> = self.rows.iter().map(|r| r.key.as_str()).collect();
        let next: HashSet<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        let kept = previous.intersection(&next).count();
        self.last_diff = RowDiff {
            kept,
            inserted: next.len() - kept,
            removed: previous.len() - kept,
        };
        trace!("Reconciled {} rows: {:?}", self.schema.name, self.last_diff);

        self.selected = selected_key
            .and_then(|key| rows.iter().position(|r| r.key == key))
            .unwrap_or_else(|| self.selected.min(rows.len().saturating_sub(1)));
        self.rows = rows;
    }

    // -------------------- Selection ---------------------- //

    pub fn select_up(&mut self, size: usize) {
        self.selected = self.selected.saturating_sub(size);
    }

    pub fn select_down(&mut self, size: usize) {
        let last = self.rows.len().saturating_sub(1);
        self.selected = std::cmp::min(self.selected + size, last);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DEFAULT_DATE_FORMAT, USERS_RESOURCE};
    use crate::record::record;
    use crate::schema::USERS;
    use crate::toast::tests::RecordingSink;
    use serde_json::json;

    fn loaded_users() -> TableController {
        let mut table = TableController::new(&USERS, DEFAULT_DATE_FORMAT);
        table.begin_loading();
        table.apply_fetch(Ok(Some(fallback_records(USERS_RESOURCE))), &mut RecordingSink::default());
        table
    }

    fn titles(table: &TableController) -> Vec<&str> {
        table.rows().iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn inputs_move_between_idle_and_filtered() {
        let mut table = loaded_users();
        assert_eq!(table.state(), TableState::Idle);
        assert_eq!(table.rows().len(), 4);

        table.set_search("sa");
        assert_eq!(table.state(), TableState::Filtered);
        assert_eq!(titles(&table), vec!["Sarah Johnson"]);

        table.set_search("");
        assert_eq!(table.state(), TableState::Idle);
        assert_eq!(table.rows().len(), 4);

        table.set_facet("type", "automotive");
        assert_eq!(table.state(), TableState::Filtered);
        assert_eq!(titles(&table), vec!["John Smith", "Mike Wilson"]);

        table.set_facet("type", "");
        assert_eq!(table.state(), TableState::Idle);
    }

    #[test]
    fn fetch_failure_falls_back_with_one_error_toast() {
        let mut table = TableController::new(&USERS, DEFAULT_DATE_FORMAT);
        let mut sink = RecordingSink::default();
        table.begin_loading();
        assert_eq!(table.load_state(), LoadState::Loading);
        table.apply_fetch(Err(DashError::Fetch("connection refused".into())), &mut sink);

        assert_eq!(table.load_state(), LoadState::Fallback);
        assert_eq!(table.rows().len(), 4);
        assert_eq!(sink.toasts.len(), 1);
        assert_eq!(sink.count(Severity::Error), 1);

        // A second failure while on sample data stays quiet.
        table.begin_loading();
        table.apply_fetch(Ok(None), &mut sink);
        assert_eq!(sink.toasts.len(), 1);
        assert_eq!(table.rows().len(), 4);
    }

    #[test]
    fn failed_refresh_keeps_live_data() {
        let mut table = TableController::new(&USERS, DEFAULT_DATE_FORMAT);
        let mut sink = RecordingSink::default();
        table.begin_loading();
        table.apply_fetch(Ok(Some(vec![record(json!({"id": "9", "name": "Live"}))])), &mut sink);
        table.begin_loading();
        assert!(table.is_loading());
        table.apply_fetch(Err(DashError::Fetch("timeout".into())), &mut sink);

        assert_eq!(table.load_state(), LoadState::Live);
        assert_eq!(titles(&table), vec!["Live"]);
        assert_eq!(sink.count(Severity::Warning), 1);
        assert_eq!(sink.count(Severity::Error), 0);
    }

    #[test]
    fn cycle_facet_walks_options_then_clears() {
        let mut table = loaded_users();
        table.cycle_facet(0);
        assert_eq!(table.filter_state().facet("type"), "automotive");
        table.cycle_facet(0);
        assert_eq!(table.filter_state().facet("type"), "realestate");
        table.cycle_facet(0);
        assert_eq!(table.filter_state().facet("type"), "");
        assert_eq!(table.state(), TableState::Idle);
        table.cycle_facet(7);
        assert_eq!(table.state(), TableState::Idle);
    }

    #[test]
    fn selection_follows_key_across_filters() {
        let mut table = loaded_users();
        table.select_down(3);
        assert_eq!(table.selected_record().map(|r| r.id.as_str()), Some("4"));

        table.set_facet("type", "realestate");
        assert_eq!(table.last_diff(), RowDiff { kept: 2, inserted: 0, removed: 2 });
        assert_eq!(table.selected(), 1);
        assert_eq!(table.selected_record().map(|r| r.id.as_str()), Some("4"));

        table.set_facet("type", "automotive");
        assert_eq!(table.last_diff(), RowDiff { kept: 0, inserted: 2, removed: 2 });
        assert_eq!(table.selected(), 1);
    }

    #[test]
    fn sorting_is_stable_and_cleared_with_filters() {
        let mut table = loaded_users();
        table.sort_by_title(SortOrder::Descending);
        assert_eq!(
            titles(&table),
            vec!["Sarah Johnson", "Mike Wilson", "John Smith", "Emma Davis"]
        );
        table.sort_by_title(SortOrder::Ascending);
        assert_eq!(titles(&table)[0], "Emma Davis");
        table.clear_filters();
        assert_eq!(table.sort(), None);
        assert_eq!(titles(&table)[0], "John Smith");
    }

    #[test]
    fn unload_discards_records() {
        let mut table = loaded_users();
        table.unload();
        assert!(table.records().is_empty());
        assert!(table.rows().is_empty());
        assert_eq!(table.load_state(), LoadState::Unloaded);
        assert!(table.selected_record().is_none());
    }
}
