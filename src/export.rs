use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::dashboard::{Dashboard, TabId};
use crate::domain::{DashError, EXPERIENCES_RESOURCE, USERS_RESOURCE};
use crate::filter::FilterState;
use crate::record::Record;
use crate::settings::Settings;

/// Snapshot of everything the dashboard holds in memory.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument<'a> {
    pub exported_at: String,
    pub active_tab: Option<TabId>,
    pub settings: &'a Settings,
    pub filters: Option<&'a FilterState>,
    pub users: Vec<&'a Record>,
    pub experiences: Vec<&'a Record>,
}

pub fn snapshot<'a>(dashboard: &'a Dashboard, settings: &'a Settings, now: DateTime<Utc>) -> ExportDocument<'a> {
    let records = |resource: &str| -> Vec<&'a Record> {
        dashboard
            .table(resource)
            .map(|t| t.records().iter().collect())
            .unwrap_or_default()
    };
    ExportDocument {
        exported_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        active_tab: dashboard.active_tab(),
        settings,
        filters: dashboard.focused_table().map(|t| t.filter_state()),
        users: records(USERS_RESOURCE),
        experiences: records(EXPERIENCES_RESOURCE),
    }
}

/// Writes the document into `dir` and returns the file path.
pub fn write_export(doc: &ExportDocument<'_>, dir: &Path, now: DateTime<Utc>) -> Result<PathBuf, DashError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("showroom-export-{}.json", now.format("%Y%m%dT%H%M%S")));
    let content = serde_json::to_string_pretty(doc)?;
    fs::write(&path, content)?;
    info!(
        "Exported {} users and {} experiences to {}",
        doc.users.len(),
        doc.experiences.len(),
        path.display()
    );
    Ok(path)
}
