use tracing::{debug, info, trace};

use crate::domain::DashError;
use crate::record::Record;
use crate::schema::{EXPERIENCES, MetricDef, TableSchema, USERS};
use crate::table::TableController;
use crate::toast::ToastSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TabId {
    Overview,
    Users,
    Experiences,
    Settings,
}

impl TabId {
    pub const ALL: [TabId; 4] = [TabId::Overview, TabId::Users, TabId::Experiences, TabId::Settings];

    pub fn index(self) -> usize {
        match self {
            TabId::Overview => 0,
            TabId::Users => 1,
            TabId::Experiences => 2,
            TabId::Settings => 3,
        }
    }

    pub fn from_index(idx: usize) -> Option<TabId> {
        TabId::ALL.get(idx).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            TabId::Overview => "Overview",
            TabId::Users => "Users",
            TabId::Experiences => "Experiences",
            TabId::Settings => "Settings",
        }
    }

    /// Page header (title, subtitle).
    pub fn header(self) -> (&'static str, &'static str) {
        match self {
            TabId::Overview => ("Dashboard Overview", "Platform health at a glance"),
            TabId::Users => ("User Management", "Manage platform users and subscriptions"),
            TabId::Experiences => ("Experiences", "Spatial showrooms created on the platform"),
            TabId::Settings => ("Settings", "Platform configuration"),
        }
    }

    fn schemas(self) -> &'static [&'static TableSchema] {
        match self {
            TabId::Overview => &OVERVIEW_TABLES,
            TabId::Users => &USERS_TABLES,
            TabId::Experiences => &EXPERIENCES_TABLES,
            TabId::Settings => &[],
        }
    }
}

static OVERVIEW_TABLES: [&TableSchema; 2] = [&USERS, &EXPERIENCES];
static USERS_TABLES: [&TableSchema; 1] = [&USERS];
static EXPERIENCES_TABLES: [&TableSchema; 1] = [&EXPERIENCES];

/// A fetch the shell wants done for the currently active tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub tab: TabId,
    pub resource: &'static str,
    pub ticket: u64,
}

#[derive(Debug)]
pub struct LoadResult {
    pub request: LoadRequest,
    pub outcome: Result<Option<Vec<Record>>, DashError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub label: &'static str,
    pub value: String,
}

pub struct TabPage {
    pub tables: Vec<TableController>,
}

/// Tab navigation over a set of table controllers.
pub struct Dashboard {
    pages: Vec<TabPage>,
    active: Option<TabId>,
    ticket: u64,
}

impl Dashboard {
    pub fn new(date_format: &str) -> Self {
        let pages = TabId::ALL
            .iter()
            .map(|&id| TabPage {
                tables: id
                    .schemas()
                    .iter()
                    .map(|&schema| TableController::new(schema, date_format))
                    .collect(),
            })
            .collect();
        Self {
            pages,
            active: None,
            ticket: 0,
        }
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.active
    }

    pub fn header(&self) -> (&'static str, &'static str) {
        self.active.unwrap_or(TabId::Overview).header()
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn page(&self, tab: TabId) -> &TabPage {
        &self.pages[tab.index()]
    }

    pub fn active_page(&self) -> Option<&TabPage> {
        self.active.map(|tab| self.page(tab))
    }

    /// The table the user interacts with. Only single table tabs have one.
    pub fn focused_table(&self) -> Option<&TableController> {
        match self.active_page()?.tables.as_slice() {
            [table] => Some(table),
            _ => None,
        }
    }

    pub fn focused_table_mut(&mut self) -> Option<&mut TableController> {
        let tab = self.active?;
        match self.pages[tab.index()].tables.as_mut_slice() {
            [table] => Some(table),
            _ => None,
        }
    }

    /// Controller for `resource` on the active tab, if it is loaded there.
    pub fn table(&self, resource: &str) -> Option<&TableController> {
        self.active_page()?
            .tables
            .iter()
            .find(|t| t.schema().resource == resource)
    }

    /// Switches to `tab`. Returns the loads to start, exactly once per activation.
    pub fn activate(&mut self, tab: TabId) -> Vec<LoadRequest> {
        if self.active == Some(tab) {
            trace!("Tab {tab:?} already active");
            return Vec::new();
        }
        if let Some(previous) = self.active {
            for table in self.pages[previous.index()].tables.iter_mut() {
                table.unload();
            }
        }
        info!("Activating tab {tab:?}");
        self.active = Some(tab);
        self.issue_loads()
    }

    /// Reloads the active tab, keeping what is shown until results arrive.
    pub fn refresh_active(&mut self) -> Vec<LoadRequest> {
        if self.active.is_none() {
            return Vec::new();
        }
        self.issue_loads()
    }

    fn issue_loads(&mut self) -> Vec<LoadRequest> {
        let Some(tab) = self.active else {
            return Vec::new();
        };
        self.ticket += 1;
        let ticket = self.ticket;
        self.pages[tab.index()]
            .tables
            .iter_mut()
            .map(|table| {
                table.begin_loading();
                LoadRequest {
                    tab,
                    resource: table.schema().resource,
                    ticket,
                }
            })
            .collect()
    }

    /// Applies a load result unless the user moved on since it was requested.
    pub fn apply_load(&mut self, result: LoadResult, sink: &mut dyn ToastSink) -> bool {
        let LoadResult { request, outcome } = result;
        if self.active != Some(request.tab) || request.ticket != self.ticket {
            debug!(
                "Dropping stale {} result (tab {:?}, ticket {} != {})",
                request.resource, request.tab, request.ticket, self.ticket
            );
            return false;
        }
        let table = self.pages[request.tab.index()]
            .tables
            .iter_mut()
            .find(|t| t.schema().resource == request.resource);
        match table {
            Some(table) => {
                table.apply_fetch(outcome, sink);
                true
            }
            None => {
                debug!("No table for {} on {:?}", request.resource, request.tab);
                false
            }
        }
    }

    /// Metrics of the active tab, reduced from the loaded records only.
    pub fn metrics(&self) -> Vec<Metric> {
        self.active_page()
            .map(|page| page.tables.iter().flat_map(table_metrics).collect())
            .unwrap_or_default()
    }
}

pub fn table_metrics(table: &TableController) -> Vec<Metric> {
    table
        .schema()
        .metrics
        .iter()
        .map(|def| Metric {
            label: def.label(),
            value: compute_metric(def, table.records()),
        })
        .collect()
}

pub fn compute_metric(def: &MetricDef, records: &[Record]) -> String {
    match def {
        MetricDef::Count { .. } => records.len().to_string(),
        MetricDef::CountWhere { field, equals, .. } => records
            .iter()
            .filter(|r| r.text(field).as_deref() == Some(*equals))
            .count()
            .to_string(),
        MetricDef::SumWhere {
            field,
            where_field,
            equals,
            ..
        } => {
            let sum: f64 = records
                .iter()
                .filter(|r| r.text(where_field).as_deref() == Some(*equals))
                .filter_map(|r| r.number(field))
                .sum();
            if sum.fract() == 0.0 {
                format!("{sum:.0}")
            } else {
                format!("{sum:.2}")
            }
        }
    }
}
