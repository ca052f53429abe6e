use crate::hooks::{QueryHooks, SqlScope};
use tracing::warn;
use trellis_core::filter::{FilterTree, SortSpec};
use trellis_core::schema::Table;
use trellis_core::{Error, Result, Schema};
use trellis_sql::{AliasGenerator, Dialect};

/// Per-statement compilation state: one alias generator per statement, plus
/// the shared collaborators.
pub(crate) struct Compile<'a> {
    pub schema: &'a Schema,
    pub dialect: &'a dyn Dialect,
    pub hooks: &'a dyn QueryHooks,
    pub aliases: AliasGenerator,
    /// Strict requests fail on unparsable filter/sort strings and unknown
    /// column titles; lenient ones log and drop them.
    pub strict: bool,
}

impl<'a> Compile<'a> {
    pub fn alias(&mut self) -> String {
        self.aliases.next()
    }

    pub fn scope(&self) -> SqlScope<'a> {
        SqlScope {
            schema: self.schema,
            dialect: self.dialect,
        }
    }

    pub fn parse_where(
        &self,
        clause: Option<&str>,
        table: &Table,
    ) -> Result<Option<FilterTree>> {
        let Some(clause) = clause else {
            return Ok(None);
        };
        match self.hooks.parse_filter(clause, table, self.schema) {
            Ok(tree) => Ok(tree),
            Err(err) if self.strict => Err(Error::invalid_filter(err)),
            Err(err) => {
                warn!(table = %table.title, %err, "dropping unparsable filter");
                Ok(None)
            }
        }
    }

    pub fn parse_sort(&self, clause: &str, table: &Table) -> Result<Vec<SortSpec>> {
        match self.hooks.parse_sort(clause, table, self.schema) {
            Ok(sorts) => Ok(sorts),
            Err(err) if self.strict => Err(Error::invalid_sort(err)),
            Err(err) => {
                warn!(table = %table.title, %err, "dropping unparsable sort");
                Ok(Vec::new())
            }
        }
    }
}
