use super::TableId;
use std::fmt;

/// A column of a [`Table`](super::Table).
///
/// Physical columns carry a storage `name`; virtual columns (links,
/// lookups, rollups, formulas, value proxies) leave it empty and are
/// compiled entirely from expressions over other columns.
#[derive(Debug, Clone)]
pub struct Column {
    /// Uniquely identifies the column within the schema.
    pub id: ColumnId,

    /// Physical column name. Empty for virtual columns.
    pub name: String,

    /// User-facing title; output columns are aliased to it.
    pub title: String,

    pub kind: ColumnKind,

    /// True when the database generates the value (serial / identity).
    pub auto_increment: bool,

    /// True for system-managed columns such as the creation timestamp.
    pub system: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ColumnId {
    pub table: TableId,
    pub index: usize,
}

impl fmt::Debug for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnId({}/{})", self.table.0, self.index)
    }
}

#[derive(Debug, Clone)]
pub enum ColumnKind {
    /// A plain stored value projected as-is.
    Scalar,
    Temporal(Temporal),
    Binary(Binary),
    /// Attachment metadata stored as a JSON document.
    Attachment,
    Link(Link),
    Lookup(Lookup),
    Rollup(Rollup),
    Formula(Formula),
    ValueProxy(ValueProxy),
}

/// A date-time column. Zoneless values are stored in the session time zone
/// and normalized to UTC on read.
#[derive(Debug, Clone)]
pub struct Temporal {
    pub with_time_zone: bool,
}

#[derive(Debug, Clone)]
pub struct Binary {
    pub format: BinaryFormat,
}

/// Transport encoding applied to binary columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Hex,
    Escape,
}

/// A relation to another table.
///
/// `child_column` always names the foreign-key side: for a belongs-to it
/// lives on the declaring table, for a has-many on the target. Many-to-many
/// links route through an associative table instead.
#[derive(Debug, Clone)]
pub struct Link {
    pub cardinality: Cardinality,
    pub target: TableId,
    /// Referenced key on the parent side of the relation.
    pub parent_column: ColumnId,
    /// Foreign key on the child side of the relation.
    pub child_column: ColumnId,
    /// Associative-table wiring; many-to-many only.
    pub through: Option<Through>,
}

#[derive(Debug, Clone)]
pub struct Through {
    pub table: TableId,
    /// Column of the associative table pointing at the declaring side.
    pub child_link: ColumnId,
    /// Column of the associative table pointing at the target side.
    pub parent_link: ColumnId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    BelongsTo,
    OneToOne,
    HasMany,
    ManyToMany,
}

impl Cardinality {
    /// True when the relation produces a JSON array rather than a single
    /// object.
    pub fn is_many(self) -> bool {
        matches!(self, Cardinality::HasMany | Cardinality::ManyToMany)
    }
}

/// Projects a column of a related table through a link on this table.
#[derive(Debug, Clone)]
pub struct Lookup {
    /// The link column (on the declaring table) to traverse.
    pub link: ColumnId,
    /// The column on the related table to surface. May itself be a lookup,
    /// forming a transitive chain.
    pub target: ColumnId,
}

/// Aggregates a column of a related table through a link on this table.
#[derive(Debug, Clone)]
pub struct Rollup {
    pub link: ColumnId,
    pub target: ColumnId,
    /// Aggregate function name, interpreted by the hooks collaborator.
    pub function: String,
}

/// An externally defined computed expression.
#[derive(Debug, Clone)]
pub struct Formula {
    pub expression: String,
    /// Set when the formula failed validation; a broken formula contributes
    /// nothing to the projection.
    pub error: Option<String>,
}

/// Redirects to another column's value, keeping this column's title
/// (barcode and QR-code columns render a referenced value).
#[derive(Debug, Clone)]
pub struct ValueProxy {
    pub value: ColumnId,
}

impl Column {
    pub fn is_virtual(&self) -> bool {
        self.name.is_empty()
    }
}

impl ColumnKind {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar)
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link(..))
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Self::Link(link) => Some(link),
            _ => None,
        }
    }

    #[track_caller]
    pub fn expect_link(&self) -> &Link {
        match self {
            Self::Link(link) => link,
            _ => panic!("expected column to be a link, but was {self:?}"),
        }
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup(..))
    }

    pub fn as_lookup(&self) -> Option<&Lookup> {
        match self {
            Self::Lookup(lookup) => Some(lookup),
            _ => None,
        }
    }

    pub fn is_rollup(&self) -> bool {
        matches!(self, Self::Rollup(..))
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, Self::Formula(..))
    }

    pub fn as_formula(&self) -> Option<&Formula> {
        match self {
            Self::Formula(formula) => Some(formula),
            _ => None,
        }
    }
}
