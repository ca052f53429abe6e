mod column;
pub use column::{
    Binary, BinaryFormat, Cardinality, Column, ColumnId, ColumnKind, Formula, Link, Lookup,
    Rollup, Temporal, Through, ValueProxy,
};

mod table;
pub use table::{Table, TableId};

use crate::{Error, Result};

/// The set of tables a compiler instance operates over.
///
/// A `Schema` is read-only once constructed; schema mutation happens in an
/// external service, which is also responsible for evicting cached
/// templates afterwards.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn from_tables(tables: Vec<Table>) -> Result<Self> {
        let schema = Self { tables };
        schema.verify()?;
        Ok(schema)
    }

    pub fn table(&self, id: impl Into<TableId>) -> &Table {
        &self.tables[id.into().0]
    }

    /// Checked lookup for ids that arrive from outside the schema.
    pub fn get_table(&self, id: impl Into<TableId>) -> Option<&Table> {
        self.tables.get(id.into().0)
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        self.table(id.table).column(id.index)
    }

    pub fn table_by_title(&self, title: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.title == title)
    }

    /// Checks cross-table references: link targets, lookup/rollup wiring,
    /// value-proxy redirects, and primary-key indices.
    fn verify(&self) -> Result<()> {
        for table in &self.tables {
            for &index in &table.primary_key {
                if index >= table.columns.len() {
                    return Err(Error::unknown_column(&table.title, format!("pk#{index}")));
                }
            }
            for column in &table.columns {
                self.verify_column(table, column)?;
            }
        }
        Ok(())
    }

    fn verify_column(&self, table: &Table, column: &Column) -> Result<()> {
        let check = |id: ColumnId| -> Result<()> {
            if id.table.0 >= self.tables.len()
                || id.index >= self.table(id.table).columns.len()
            {
                return Err(Error::unknown_column(&table.title, &column.title));
            }
            Ok(())
        };

        match &column.kind {
            ColumnKind::Link(link) => {
                if link.target.0 >= self.tables.len() {
                    return Err(Error::unknown_column(&table.title, &column.title));
                }
                check(link.parent_column)?;
                check(link.child_column)?;
                if let Some(through) = &link.through {
                    check(through.parent_link)?;
                    check(through.child_link)?;
                }
            }
            ColumnKind::Lookup(lookup) => {
                check(lookup.link)?;
                check(lookup.target)?;
                if !self.column(lookup.link).kind.is_link() {
                    return Err(Error::unknown_column(&table.title, &column.title));
                }
            }
            ColumnKind::Rollup(rollup) => {
                check(rollup.link)?;
                check(rollup.target)?;
            }
            ColumnKind::ValueProxy(proxy) => check(proxy.value)?,
            _ => {}
        }
        Ok(())
    }
}
