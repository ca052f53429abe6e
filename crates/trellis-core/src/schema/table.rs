use super::{Column, ColumnKind};
use std::fmt;

#[derive(Debug, Clone)]
pub struct Table {
    pub id: TableId,

    /// Physical table name.
    pub name: String,

    /// User-facing title.
    pub title: String,

    pub columns: Vec<Column>,

    /// Indices (into `columns`) of the primary-key columns, in key order.
    pub primary_key: Vec<usize>,

    /// Index of the display column, when one is configured.
    pub display_column: Option<usize>,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub usize);

impl fmt::Debug for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

impl From<usize> for TableId {
    fn from(v: usize) -> Self {
        TableId(v)
    }
}

impl Table {
    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn column_by_title(&self, title: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.title == title)
    }

    /// Primary-key columns in key order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &Column> {
        self.primary_key.iter().map(|&index| &self.columns[index])
    }

    /// The first primary-key column, when one exists.
    pub fn primary_key(&self) -> Option<&Column> {
        self.primary_key.first().map(|&index| &self.columns[index])
    }

    pub fn display_column(&self) -> Option<&Column> {
        self.display_column.map(|index| &self.columns[index])
    }

    pub fn is_primary_key(&self, column: &Column) -> bool {
        self.primary_key.contains(&column.id.index)
    }

    pub fn is_display(&self, column: &Column) -> bool {
        self.display_column == Some(column.id.index)
    }

    /// The system creation-timestamp column, used by the sort fallback when
    /// the primary key is not database-generated.
    pub fn created_at(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.system && matches!(column.kind, ColumnKind::Temporal(_)))
    }

    /// Default projection for an unexpanded relation: primary key plus
    /// display column, collapsed when they coincide.
    pub fn default_fields(&self) -> Vec<&Column> {
        let mut fields: Vec<&Column> = self.primary_keys().collect();
        if let Some(display) = self.display_column() {
            if !fields.iter().any(|column| column.id == display.id) {
                fields.push(display);
            }
        }
        fields
    }
}
