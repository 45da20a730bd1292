use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::record::Record;

/// Search text plus one selected value per facet. Empty means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub search_text: String,
    pub facets: BTreeMap<String, String>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.search_text.is_empty() && self.facets.values().all(|v| v.is_empty())
    }

    pub fn facet(&self, field: &str) -> &str {
        self.facets.get(field).map(String::as_str).unwrap_or("")
    }

    fn matches(&self, record: &Record, needle: &str, search_fields: &[&str]) -> bool {
        let facets_ok = self
            .facets
            .iter()
            .filter(|(_, wanted)| !wanted.is_empty())
            .all(|(field, wanted)| record.text(field).as_deref() == Some(wanted.as_str()));
        if !facets_ok {
            return false;
        }
        needle.is_empty()
            || search_fields.iter().any(|field| {
                record
                    .text(field)
                    .is_some_and(|value| value.to_lowercase().contains(needle))
            })
    }
}

/// Returns the records matching `state`, in their original order.
pub fn filter<'a>(records: &'a [Record], state: &FilterState, search_fields: &[&str]) -> Vec<&'a Record> {
    if state.is_empty() {
        return records.iter().collect();
    }
    let needle = state.search_text.to_lowercase();
    // Collecting an indexed parallel iterator keeps the input order.
    records
        .par_iter()
        .filter(|record| state.matches(record, &needle, search_fields))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::USERS_RESOURCE;
    use crate::record::{fallback_records, record};
    use serde_json::json;

    const FIELDS: &[&str] = &["name", "email"];

    fn state(search: &str, facets: &[(&str, &str)]) -> FilterState {
        FilterState {
            search_text: search.to_string(),
            facets: facets
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn ids(rows: &[&Record]) -> Vec<String> {
        rows.iter().map(|r| r.id.clone()).collect()
    }

    fn is_subsequence(sub: &[&Record], all: &[Record]) -> bool {
        let mut it = all.iter();
        sub.iter().all(|s| it.any(|r| std::ptr::eq(r, *s)))
    }

    #[test]
    fn empty_state_is_identity() {
        let users = fallback_records(USERS_RESOURCE);
        let out = filter(&users, &FilterState::default(), FIELDS);
        assert_eq!(out.len(), users.len());
        assert!(out.iter().zip(users.iter()).all(|(a, b)| std::ptr::eq(*a, b)));

        // Facets that are present but empty are no constraint either.
        let blank = state("", &[("type", "")]);
        assert!(blank.is_empty());
        assert_eq!(filter(&users, &blank, FIELDS).len(), 4);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(filter(&[], &state("x", &[("type", "automotive")]), FIELDS).is_empty());
    }

    #[test]
    fn facet_keeps_relative_order() {
        let users = fallback_records(USERS_RESOURCE);
        let out = filter(&users, &state("", &[("type", "automotive")]), FIELDS);
        assert_eq!(ids(&out), vec!["1", "3"]);
        assert!(is_subsequence(&out, &users));
    }

    #[test]
    fn facet_match_is_case_sensitive() {
        let users = fallback_records(USERS_RESOURCE);
        assert!(filter(&users, &state("", &[("type", "Automotive")]), FIELDS).is_empty());
    }

    #[test]
    fn search_is_case_insensitive_over_search_fields() {
        let users = fallback_records(USERS_RESOURCE);
        let out = filter(&users, &state("sarah", &[]), FIELDS);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text("name").as_deref(), Some("Sarah Johnson"));

        let by_mail = filter(&users, &state("LUXURYHOMES", &[]), FIELDS);
        assert_eq!(ids(&by_mail), vec!["4"]);

        // The plan is not a search field.
        assert!(filter(&users, &state("enterprise", &[]), FIELDS).is_empty());
    }

    #[test]
    fn search_text_is_matched_verbatim() {
        let records = vec![
            record(json!({"id": "a", "name": "Ann Smithers"})),
            record(json!({"id": "b", "name": "John Smith"})),
            record(json!({"id": "c", "name": "Smithy"})),
        ];
        let out = filter(&records, &state(" smith", &[]), FIELDS);
        assert_eq!(ids(&out), vec!["a", "b"]);

        // Whitespace only is a constraint, not an empty search.
        let spaces = state("  ", &[]);
        assert!(!spaces.is_empty());
        assert!(filter(&records, &spaces, FIELDS).is_empty());
    }

    #[test]
    fn facets_and_search_are_conjunctive() {
        let users = fallback_records(USERS_RESOURCE);
        let out = filter(
            &users,
            &state("m", &[("type", "automotive"), ("subscription.status", "active")]),
            FIELDS,
        );
        // john@autodealer.com and Mike Wilson, not Emma (realestate).
        assert_eq!(ids(&out), vec!["1", "3"]);
        assert!(is_subsequence(&out, &users));
    }

    #[test]
    fn missing_field_never_matches_a_facet() {
        let records = vec![record(json!({"id": "a", "name": "No type"}))];
        assert!(filter(&records, &state("", &[("type", "automotive")]), FIELDS).is_empty());
        assert_eq!(filter(&records, &state("type", &[]), FIELDS).len(), 1);
    }

    #[test]
    fn output_is_always_a_subsequence() {
        let mut records = fallback_records(USERS_RESOURCE);
        records.extend(fallback_records(USERS_RESOURCE));
        for search in ["", "o", "an", "com", "zzz"] {
            for facet in ["", "automotive", "realestate"] {
                let out = filter(&records, &state(search, &[("type", facet)]), FIELDS);
                assert!(is_subsequence(&out, &records), "{search}/{facet}");
            }
        }
    }
}
