use serde::Serialize;

use crate::domain::{EXPERIENCES_RESOURCE, USERS_RESOURCE};

/// Colour key of a category badge. Mapped to terminal colours by the ui.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Swatch {
    Blue,
    Green,
    Amber,
    Purple,
    Gray,
}

#[derive(Debug)]
pub struct Facet {
    pub field: &'static str,
    pub label: &'static str,
    pub options: &'static [&'static str],
}

#[derive(Debug)]
pub enum MetricDef {
    Count {
        label: &'static str,
    },
    CountWhere {
        label: &'static str,
        field: &'static str,
        equals: &'static str,
    },
    SumWhere {
        label: &'static str,
        field: &'static str,
        where_field: &'static str,
        equals: &'static str,
    },
}

impl MetricDef {
    pub fn label(&self) -> &'static str {
        match self {
            MetricDef::Count { label }
            | MetricDef::CountWhere { label, .. }
            | MetricDef::SumWhere { label, .. } => label,
        }
    }
}

/// Static description of one backend resource and how its table looks.
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub resource: &'static str,
    pub title_field: &'static str,
    pub subtitle_field: &'static str,
    pub search_fields: &'static [&'static str],
    pub category_field: &'static str,
    pub category_labels: &'static [(&'static str, &'static str)],
    pub category_swatches: &'static [(&'static str, Swatch)],
    pub default_swatch: Swatch,
    pub status_field: &'static str,
    pub date_field: &'static str,
    pub facets: &'static [Facet],
    pub metrics: &'static [MetricDef],
}

impl TableSchema {
    pub fn category_label<'a>(&self, category: &'a str) -> &'a str {
        self.category_labels
            .iter()
            .find(|(key, _)| *key == category)
            .map(|(_, label)| *label)
            .unwrap_or(category)
    }

    pub fn swatch(&self, category: &str) -> Swatch {
        self.category_swatches
            .iter()
            .find(|(key, _)| *key == category)
            .map(|(_, swatch)| *swatch)
            .unwrap_or(self.default_swatch)
    }
}

const CATEGORY_LABELS: &[(&str, &str)] = &[("automotive", "Automotive"), ("realestate", "Real Estate")];
const CATEGORY_SWATCHES: &[(&str, Swatch)] = &[
    ("automotive", Swatch::Blue),
    ("realestate", Swatch::Green),
];
const CATEGORY_OPTIONS: &[&str] = &["automotive", "realestate"];

pub static USERS: TableSchema = TableSchema {
    name: "users",
    resource: USERS_RESOURCE,
    title_field: "name",
    subtitle_field: "email",
    search_fields: &["name", "email"],
    category_field: "type",
    category_labels: CATEGORY_LABELS,
    category_swatches: CATEGORY_SWATCHES,
    default_swatch: Swatch::Gray,
    status_field: "subscription.status",
    date_field: "createdAt",
    facets: &[
        Facet {
            field: "type",
            label: "Type",
            options: CATEGORY_OPTIONS,
        },
        Facet {
            field: "subscription.status",
            label: "Status",
            options: &["active", "trialing", "past_due", "canceled"],
        },
    ],
    metrics: &[
        MetricDef::Count {
            label: "Total Users",
        },
        MetricDef::CountWhere {
            label: "Active Subscriptions",
            field: "subscription.status",
            equals: "active",
        },
        MetricDef::CountWhere {
            label: "Automotive",
            field: "type",
            equals: "automotive",
        },
        MetricDef::CountWhere {
            label: "Real Estate",
            field: "type",
            equals: "realestate",
        },
    ],
};

pub static EXPERIENCES: TableSchema = TableSchema {
    name: "experiences",
    resource: EXPERIENCES_RESOURCE,
    title_field: "name",
    subtitle_field: "owner",
    search_fields: &["name", "owner"],
    category_field: "type",
    category_labels: CATEGORY_LABELS,
    category_swatches: CATEGORY_SWATCHES,
    default_swatch: Swatch::Gray,
    status_field: "status",
    date_field: "createdAt",
    facets: &[
        Facet {
            field: "type",
            label: "Type",
            options: CATEGORY_OPTIONS,
        },
        Facet {
            field: "status",
            label: "Status",
            options: &["published", "draft", "archived"],
        },
    ],
    metrics: &[
        MetricDef::Count {
            label: "Experiences",
        },
        MetricDef::CountWhere {
            label: "Published",
            field: "status",
            equals: "published",
        },
        MetricDef::SumWhere {
            label: "Published Views",
            field: "views",
            where_field: "status",
            equals: "published",
        },
    ],
};
