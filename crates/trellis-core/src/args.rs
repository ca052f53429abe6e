use crate::filter::{FilterTree, SortSpec};
use serde::Deserialize;
use std::collections::HashMap;

/// Per-request arguments for a list (or nested relation) query.
///
/// String-valued `where`, `sort`, and `fields` are parsed lazily at compile
/// time; the structured `filter_arr` / `sort_arr` come from callers that
/// already hold parsed trees. Any ad-hoc argument makes the request
/// ineligible for template caching.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListArgs {
    pub limit: Option<u64>,
    pub offset: Option<u64>,

    /// Ad-hoc filter string, grammar owned by the hooks collaborator.
    #[serde(rename = "where")]
    pub where_clause: Option<String>,

    /// Ad-hoc sort string, e.g. `-Population,Name`.
    pub sort: Option<String>,

    /// Explicit projection: `*` or a comma-separated list of titles.
    pub fields: Option<String>,

    /// Structured filters ANDed with everything else.
    #[serde(skip)]
    pub filter_arr: Vec<FilterTree>,

    /// Structured sorts, applied before any parsed `sort` string.
    #[serde(skip)]
    pub sort_arr: Vec<SortSpec>,

    /// Arguments for nested relations, keyed by relation column title.
    pub nested: HashMap<String, ListArgs>,
}

impl ListArgs {
    pub const DEFAULT_LIMIT: u64 = 25;
    pub const MAX_LIMIT: u64 = 1000;

    /// Requested page size, defaulted and clamped to `1..=MAX_LIMIT`.
    pub fn limit(&self) -> u64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }

    pub fn nested(&self, title: &str) -> Option<&ListArgs> {
        self.nested.get(title)
    }

    /// True when the request carries no ad-hoc shape: no filter, sort,
    /// field list, or nested arguments. Only such requests may use a cached
    /// template, since everything else alters the statement text.
    pub fn is_default_shape(&self) -> bool {
        self.where_clause.is_none()
            && self.sort.is_none()
            && self.fields.is_none()
            && self.filter_arr.is_empty()
            && self.sort_arr.is_empty()
            && self.nested.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(ListArgs::default().limit(), 25);
        let args = ListArgs {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(args.limit(), 1);
        let args = ListArgs {
            limit: Some(5000),
            ..Default::default()
        };
        assert_eq!(args.limit(), 1000);
    }

    #[test]
    fn default_shape_detection() {
        assert!(ListArgs::default().is_default_shape());

        let args = ListArgs {
            limit: Some(50),
            offset: Some(100),
            ..Default::default()
        };
        assert!(args.is_default_shape(), "pagination alone keeps the shape");

        let args = ListArgs {
            where_clause: Some("(Population,gt,1000)".into()),
            ..Default::default()
        };
        assert!(!args.is_default_shape());
    }

    #[test]
    fn deserializes_from_query_shape() {
        let args: ListArgs = serde_json::from_str(
            r#"{"limit": 10, "where": "(Name,eq,Malta)", "nested": {"Cities": {"limit": 3}}}"#,
        )
        .unwrap();
        assert_eq!(args.limit(), 10);
        assert_eq!(args.where_clause.as_deref(), Some("(Name,eq,Malta)"));
        assert_eq!(args.nested("Cities").unwrap().limit(), 3);
    }
}
