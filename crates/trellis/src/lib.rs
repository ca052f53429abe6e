//! A query compiler that turns a table, a field-selection tree, and list
//! arguments into a single SQL statement: related rows are gathered by
//! lateral joins and aggregated into JSON server-side, so a page of rows
//! with nested relations costs one round trip instead of N+1.
//!
//! Statements whose shape does not depend on the request (no ad-hoc
//! filters, sorts, or field lists) are cached as text templates and
//! replayed with fresh key or pagination values.

mod engine;
pub use engine::{
    Engine, EngineBuilder, ListRequest, ListResponse, NoCache, ReadRequest,
};

pub mod hooks;
pub use hooks::{QueryHooks, SqlScope, UnsupportedHooks};

pub use trellis_core::{
    Driver, EngineFamily, Error, ListArgs, QueryCache, Result, Row, RowKey, Schema, Selection,
    Value, View,
};
pub use trellis_sql::{Dialect, Mysql, Postgres};
