use crate::schema::ColumnId;
use crate::Value;

/// A parsed filter condition.
///
/// Trees arrive from view configuration or from the hooks collaborator's
/// `where`-string parser; the compiler itself never parses filter grammar,
/// it only hands trees back to the hooks for SQL rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterTree {
    Group {
        op: LogicalOp,
        children: Vec<FilterTree>,
    },
    Cmp {
        column: ColumnId,
        op: CompareOp,
        value: Value,
    },
}

impl FilterTree {
    pub fn and(children: Vec<FilterTree>) -> Self {
        FilterTree::Group {
            op: LogicalOp::And,
            children,
        }
    }

    pub fn cmp(column: ColumnId, op: CompareOp, value: impl Into<Value>) -> Self {
        FilterTree::Cmp {
            column,
            op,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub column: ColumnId,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}
