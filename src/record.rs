use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::domain::{DashError, EXPERIENCES_RESOURCE, USERS_RESOURCE};

/// A single row of backend data.
///
/// Fields are kept as raw json values so nested objects such as
/// `subscription: {plan, status}` can be addressed with dotted paths.
/// The table only ever reads records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Record {
    pub fn from_value(value: Value) -> Result<Self, DashError> {
        let Value::Object(mut fields) = value else {
            return Err(DashError::Fetch("record is not a json object".into()));
        };
        let id = match fields.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(DashError::Fetch("record without id".into())),
        };
        Ok(Record { id, fields })
    }

    /// Looks up a field by dotted path, e.g. `subscription.status`.
    pub fn field(&self, path: &str) -> Option<&Value> {
        if path == "id" {
            return None;
        }
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Text form of a scalar field. Objects, arrays and null have none.
    pub fn text(&self, path: &str) -> Option<String> {
        if path == "id" {
            return Some(self.id.clone());
        }
        match self.field(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn number(&self, path: &str) -> Option<f64> {
        match self.field(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Turns a source payload into records.
///
/// Accepts a top level array or an object carrying a `data` array. `null`
/// means the source has nothing to offer. Elements that are not usable
/// records are skipped, as are later records repeating an id.
pub fn records_from_payload(payload: Value) -> Result<Option<Vec<Record>>, DashError> {
    let items = match payload {
        Value::Null => return Ok(None),
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => return Ok(None),
            _ => return Err(DashError::Fetch("payload has no data array".into())),
        },
        _ => return Err(DashError::Fetch("unexpected payload shape".into())),
    };

    let total = items.len();
    let mut seen = HashSet::with_capacity(total);
    let records: Vec<Record> = items
        .into_iter()
        .filter_map(|item| match Record::from_value(item) {
            Ok(record) if seen.insert(record.id.clone()) => Some(record),
            Ok(record) => {
                warn!("Skipping source element: duplicate id {}", record.id);
                None
            }
            Err(e) => {
                warn!("Skipping source element: {e}");
                None
            }
        })
        .collect();
    if records.len() < total {
        warn!("Dropped {} of {} source elements", total - records.len(), total);
    }
    Ok(Some(records))
}

/// The fixed sample set shown whenever `resource` can not be fetched.
pub fn fallback_records(resource: &str) -> Vec<Record> {
    let values = match resource {
        USERS_RESOURCE => json!([
            {
                "id": "1",
                "name": "John Smith",
                "email": "john@autodealer.com",
                "type": "automotive",
                "subscription": { "plan": "professional", "status": "active" },
                "createdAt": "2024-01-15T10:00:00Z"
            },
            {
                "id": "2",
                "name": "Sarah Johnson",
                "email": "sarah@realestate.com",
                "type": "realestate",
                "subscription": { "plan": "enterprise", "status": "active" },
                "createdAt": "2024-01-20T14:30:00Z"
            },
            {
                "id": "3",
                "name": "Mike Wilson",
                "email": "mike@carshowroom.com",
                "type": "automotive",
                "subscription": { "plan": "basic", "status": "active" },
                "createdAt": "2024-02-01T09:15:00Z"
            },
            {
                "id": "4",
                "name": "Emma Davis",
                "email": "emma@luxuryhomes.com",
                "type": "realestate",
                "subscription": { "plan": "professional", "status": "active" },
                "createdAt": "2024-02-10T16:45:00Z"
            }
        ]),
        EXPERIENCES_RESOURCE => json!([
            {
                "id": "exp-1",
                "name": "Midnight Roadster Showroom",
                "owner": "john@autodealer.com",
                "type": "automotive",
                "status": "published",
                "views": 1250,
                "createdAt": "2024-01-18T12:00:00Z"
            },
            {
                "id": "exp-2",
                "name": "Lakeside Villa Tour",
                "owner": "sarah@realestate.com",
                "type": "realestate",
                "status": "published",
                "views": 890,
                "createdAt": "2024-01-25T08:20:00Z"
            },
            {
                "id": "exp-3",
                "name": "Electric SUV Configurator",
                "owner": "mike@carshowroom.com",
                "type": "automotive",
                "status": "draft",
                "views": 0,
                "createdAt": "2024-02-05T17:40:00Z"
            }
        ]),
        _ => json!([]),
    };
    match records_from_payload(values) {
        Ok(Some(records)) => records,
        _ => Vec::new(),
    }
}

#[cfg(test)]
pub(crate) fn record(value: Value) -> Record {
    Record::from_value(value).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_fields_resolve_by_path() {
        let r = record(json!({"id": 7, "subscription": {"plan": "basic", "status": "active"}}));
        assert_eq!(r.id, "7");
        assert_eq!(r.text("subscription.status").as_deref(), Some("active"));
        assert_eq!(r.text("subscription.missing"), None);
        assert_eq!(r.text("subscription"), None);
    }

    #[test]
    fn records_need_an_id() {
        assert!(Record::from_value(json!({"name": "x"})).is_err());
        assert!(Record::from_value(json!({"id": ""})).is_err());
        assert!(Record::from_value(json!("id")).is_err());
    }

    #[test]
    fn payload_shapes() {
        assert!(records_from_payload(Value::Null).unwrap().is_none());
        let wrapped = records_from_payload(json!({"data": [{"id": "a"}, 5]})).unwrap();
        assert_eq!(wrapped.unwrap().len(), 1);
        assert!(records_from_payload(json!("nope")).is_err());
    }

    #[test]
    fn duplicate_ids_keep_the_first_record() {
        let records = records_from_payload(json!([
            {"id": "1", "name": "Ann"},
            {"id": 1, "name": "Bob"},
            {"id": "2", "name": "Cid"},
            {"id": "1", "name": "Dee"}
        ]))
        .unwrap()
        .unwrap();
        let names: Vec<_> = records.iter().filter_map(|r| r.text("name")).collect();
        assert_eq!(names, vec!["Ann", "Cid"]);
    }

    #[test]
    fn fallback_users_are_the_four_sample_accounts() {
        let users = fallback_records(USERS_RESOURCE);
        assert_eq!(users.len(), 4);
        assert!(
            users
                .iter()
                .all(|u| u.text("subscription.status").as_deref() == Some("active"))
        );
        assert!(fallback_records("/api/admin/unknown").is_empty());
    }

    #[test]
    fn serializes_flat() {
        let r = record(json!({"id": "1", "name": "A"}));
        let out = serde_json::to_value(&r).unwrap();
        assert_eq!(out, json!({"id": "1", "name": "A"}));
    }
}
