use trellis_core::schema::TableId;
use trellis_core::{async_trait, QueryCache, Result, View};

/// Key prefix for all stored statement templates.
pub(crate) const CACHE_SCOPE: &str = "trellis:qt";

/// Output column carrying the embedded row count on `list` statements.
pub(crate) const COUNT_COLUMN: &str = "__count";

/// `scope:tableId:viewId:operation`, with `default` standing in when no
/// view is pinned. One template per (table, view, operation).
pub(crate) fn cache_key(table: TableId, view: Option<&View>, operation: &str) -> String {
    format!(
        "{CACHE_SCOPE}:{}:{}:{operation}",
        table.0,
        view.map(|view| view.id.as_str()).unwrap_or("default")
    )
}

/// The prefix covering every template of one table, for eviction after a
/// schema change.
pub(crate) fn table_prefix(table: TableId) -> String {
    format!("{CACHE_SCOPE}:{}:", table.0)
}

/// A cache that stores nothing. Used when no shared cache is wired up;
/// every request compiles fresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl QueryCache for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _template: &str) -> Result<()> {
        Ok(())
    }

    async fn evict_prefix(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        let view = View::new("vw_abc");
        assert_eq!(
            cache_key(TableId(4), Some(&view), "list"),
            "trellis:qt:4:vw_abc:list"
        );
        assert_eq!(cache_key(TableId(4), None, "read"), "trellis:qt:4:default:read");
        assert!(cache_key(TableId(4), None, "read").starts_with(&table_prefix(TableId(4))));
    }
}
