use std::fmt::Write;

use chrono::{DateTime, NaiveDate};
use tracing::{trace, warn};

use crate::domain::{DashError, INVALID_DATE};
use crate::record::Record;
use crate::schema::{Swatch, TableSchema};

/// Render ready projection of a record, keyed by the record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub key: String,
    pub avatar: String,
    pub title: String,
    pub subtitle: String,
    pub badge: String,
    pub swatch: Swatch,
    pub status: String,
    pub date: String,
}

/// Builds display rows. Records that can not be rendered are skipped.
pub fn render<'a>(
    schema: &TableSchema,
    records: impl IntoIterator<Item = &'a Record>,
    date_format: &str,
) -> Vec<DisplayRow> {
    let rows: Vec<DisplayRow> = records
        .into_iter()
        .filter_map(|record| match render_row(schema, record, date_format) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!("{} record {}: {e}", schema.name, record.id);
                None
            }
        })
        .collect();
    trace!("Rendered {} {} rows", rows.len(), schema.name);
    rows
}

pub fn render_row(schema: &TableSchema, record: &Record, date_format: &str) -> Result<DisplayRow, DashError> {
    let title = record
        .text(schema.title_field)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| DashError::Render(format!("missing \"{}\"", schema.title_field)))?;
    let avatar = title
        .trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default();
    let category = record.text(schema.category_field).unwrap_or_default();

    Ok(DisplayRow {
        key: record.id.clone(),
        avatar,
        subtitle: record.text(schema.subtitle_field).unwrap_or_default(),
        badge: schema.category_label(&category).to_string(),
        swatch: schema.swatch(&category),
        status: capitalize(&record.text(schema.status_field).unwrap_or_default()),
        date: format_date(record.text(schema.date_field).as_deref(), date_format),
        title,
    })
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Formats RFC 3339 timestamps and plain `YYYY-MM-DD` dates.
/// Anything else shows as "Invalid Date".
pub fn format_date(raw: Option<&str>, date_format: &str) -> String {
    let Some(raw) = raw.map(str::trim) else {
        return INVALID_DATE.to_string();
    };
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"));
    date.ok()
        .and_then(|date| format_naive_date(date, date_format))
        .unwrap_or_else(|| INVALID_DATE.to_string())
}

/// Formats `date` with a strftime pattern. `None` if the pattern needs
/// more than a date (e.g. `%H:%M`) or does not parse.
pub fn format_naive_date(date: NaiveDate, date_format: &str) -> Option<String> {
    let mut out = String::new();
    match write!(out, "{}", date.format(date_format)) {
        Ok(()) => Some(out),
        Err(_) => {
            trace!("Can not format {date} with \"{date_format}\"");
            None
        }
    }
}
