use trellis_core::Value;

/// A bind parameter attached to a [`Fragment`].
///
/// The distinction drives template rendering: `Const` binds are part of the
/// statement's shape (view filters, nested page sizes) and get inlined as
/// literals in a cached template, while `Runtime` binds (row keys, the root
/// limit and offset) stay as bare markers and are supplied on replay.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Const(Value),
    Runtime(Value),
}

impl Bind {
    pub fn value(&self) -> &Value {
        match self {
            Bind::Const(v) | Bind::Runtime(v) => v,
        }
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, Bind::Runtime(_))
    }
}

/// A piece of SQL text using `?` for bind markers, plus the binds in
/// marker order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub binds: Vec<Bind>,
}

impl Fragment {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub fn with_binds(sql: impl Into<String>, binds: Vec<Bind>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }
}
