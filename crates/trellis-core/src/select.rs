use crate::schema::{Column, Table};
use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};

/// The field-selection tree gating which columns a compiled statement
/// projects, per table and recursively for nested relations.
///
/// Deserializes from the caller's JSON shape: `true` (or `1`) selects the
/// primary key and display column only; an object selects the named titles,
/// each mapping to the subtree for that relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Primary key and display column only.
    Primary,
    /// The named column titles, with per-relation subtrees.
    Fields(IndexMap<String, Selection>),
}

impl Selection {
    pub fn fields<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Fields(
            titles
                .into_iter()
                .map(|title| (title.into(), Selection::Primary))
                .collect(),
        )
    }

    /// Whether `column` is projected at this level.
    pub fn includes(&self, table: &Table, column: &Column) -> bool {
        match self {
            Selection::Primary => table.is_primary_key(column) || table.is_display(column),
            Selection::Fields(map) => map.contains_key(&column.title),
        }
    }

    /// The subtree for a selected relation column. Absent entries and
    /// `Primary` parents both collapse to `Primary`.
    pub fn child(&self, title: &str) -> &Selection {
        const PRIMARY: &Selection = &Selection::Primary;
        match self {
            Selection::Primary => PRIMARY,
            Selection::Fields(map) => map.get(title).unwrap_or(PRIMARY),
        }
    }

    /// Titles named at this level, in selection order. Empty for `Primary`.
    pub fn titles(&self) -> Vec<&str> {
        match self {
            Selection::Primary => Vec::new(),
            Selection::Fields(map) => map.keys().map(String::as_str).collect(),
        }
    }

    fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::Bool(true) => Ok(Selection::Primary),
            serde_json::Value::Number(n) if n.as_i64() == Some(1) => Ok(Selection::Primary),
            serde_json::Value::Object(map) => {
                let mut fields = IndexMap::with_capacity(map.len());
                for (title, child) in map {
                    fields.insert(title.clone(), Selection::from_json(child)?);
                }
                Ok(Selection::Fields(fields))
            }
            other => Err(format!(
                "selection entries must be `true`, `1`, or an object, got {other}"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Selection::from_json(&value).map_err(serde::de::Error::custom)
    }
}
