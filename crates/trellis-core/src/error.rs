use std::fmt;
use std::sync::Arc;

/// An error raised while compiling or executing a query.
///
/// Cheap to clone; the payload lives behind an `Arc`.
#[derive(Clone)]
pub struct Error {
    inner: Arc<ErrorInner>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
}

#[derive(Debug)]
enum ErrorKind {
    /// The compiler was constructed for one engine family but handed a
    /// driver (or dialect) belonging to another.
    DialectMismatch { expected: String, actual: String },

    /// An ad-hoc filter string could not be parsed in strict mode.
    InvalidFilter(String),

    /// An ad-hoc sort string could not be parsed in strict mode.
    InvalidSort(String),

    /// A formula column could not be translated to a SQL expression.
    Formula(String),

    /// A lookup or relation chain exceeded the maximum nesting depth.
    NestingDepth { depth: usize, max: usize },

    /// A column title did not resolve against the table in strict mode.
    UnknownColumn { table: String, title: String },

    /// A stored template did not line up with the replay values.
    Template(String),

    /// The database driver reported a failure.
    Execution(anyhow::Error),

    Anyhow(anyhow::Error),
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            inner: Arc::new(ErrorInner { kind }),
        }
    }

    pub fn dialect_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(ErrorKind::DialectMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }

    pub fn invalid_filter(msg: impl fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidFilter(msg.to_string()))
    }

    pub fn invalid_sort(msg: impl fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidSort(msg.to_string()))
    }

    pub fn formula(msg: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Formula(msg.to_string()))
    }

    pub fn nesting_depth(depth: usize, max: usize) -> Self {
        Self::new(ErrorKind::NestingDepth { depth, max })
    }

    pub fn unknown_column(table: impl fmt::Display, title: impl fmt::Display) -> Self {
        Self::new(ErrorKind::UnknownColumn {
            table: table.to_string(),
            title: title.to_string(),
        })
    }

    pub fn template(msg: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Template(msg.to_string()))
    }

    pub fn execution(err: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorKind::Execution(err.into()))
    }

    pub fn is_dialect_mismatch(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::DialectMismatch { .. })
    }

    pub fn is_invalid_filter(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::InvalidFilter(_))
    }

    pub fn is_invalid_sort(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::InvalidSort(_))
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Formula(_))
    }

    pub fn is_nesting_depth(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::NestingDepth { .. })
    }

    pub fn is_unknown_column(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::UnknownColumn { .. })
    }

    pub fn is_execution(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Execution(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ErrorKind::*;

        match &self.inner.kind {
            DialectMismatch { expected, actual } => {
                write!(f, "dialect mismatch: compiled for {expected}, driver is {actual}")
            }
            InvalidFilter(msg) => write!(f, "invalid filter: {msg}"),
            InvalidSort(msg) => write!(f, "invalid sort: {msg}"),
            Formula(msg) => write!(f, "formula error: {msg}"),
            NestingDepth { depth, max } => {
                write!(f, "nesting depth {depth} exceeds maximum {max}")
            }
            UnknownColumn { table, title } => {
                write!(f, "unknown column {title:?} on table {table:?}")
            }
            Template(msg) => write!(f, "template error: {msg}"),
            Execution(err) => write!(f, "execution failed: {err}"),
            Anyhow(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.debug_struct("Error").field("kind", &self.inner.kind).finish()
        } else {
            fmt::Display::fmt(self, f)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.inner.kind {
            ErrorKind::Execution(err) | ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::new(ErrorKind::Anyhow(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::from(anyhow::Error::from(err))
    }
}
