use crate::filter::{FilterTree, SortSpec};

/// A saved view: persistent filters and sorts applied before any per-request
/// arguments. Views never vary per request, so view-only queries stay
/// eligible for template caching.
#[derive(Debug, Clone, Default)]
pub struct View {
    pub id: String,
    pub filters: Vec<FilterTree>,
    pub sorts: Vec<SortSpec>,
}

impl View {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}
