mod mysql;
mod postgres;

pub use mysql::Mysql;
pub use postgres::Postgres;

use trellis_core::schema::BinaryFormat;
use trellis_core::{EngineFamily, Value};

/// Everything that differs between target SQL engines.
///
/// The compiler core is dialect-agnostic; every piece of engine-specific
/// text (quoting, markers, literals, JSON construction, timezone and binary
/// handling) goes through this trait. Adding an engine means adding an
/// implementation, not editing the compiler.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn family(&self) -> EngineFamily;

    /// Appends `ident` quoted for this engine.
    fn push_ident(&self, out: &mut String, ident: &str);

    /// Appends the positional bind marker for 1-based position `n`.
    fn push_marker(&self, out: &mut String, n: usize);

    /// Appends `value` rendered as a SQL literal.
    fn push_literal(&self, out: &mut String, value: &Value);

    /// A JSON object expression from `(title, expr)` pairs.
    fn json_object(&self, pairs: &[(String, String)]) -> String;

    /// Aggregates grouped rows into a JSON array of objects, yielding an
    /// empty array when no rows match.
    fn json_agg_objects(&self, pairs: &[(String, String)]) -> String;

    /// Aggregates a single expression into a JSON array, yielding an empty
    /// array when no rows match.
    fn json_agg(&self, expr: &str) -> String;

    /// A FROM-clause item exploding the JSON array `expr` into one row per
    /// element, aliased `alias`.
    fn json_unnest(&self, expr: &str, alias: &str) -> String;

    /// The expression referring to one element produced by [`json_unnest`].
    ///
    /// [`json_unnest`]: Dialect::json_unnest
    fn json_unnest_element(&self, alias: &str) -> String;

    /// Converts a zoneless timestamp from the session time zone to UTC.
    fn utc_expr(&self, expr: &str) -> String;

    /// Encodes a binary column for transport.
    fn binary_expr(&self, expr: &str, format: BinaryFormat) -> String;

    /// Casts an expression to the engine's JSON type.
    fn json_cast(&self, expr: &str) -> String;

    /// Whether a correlated count sub-select can ride along as a projection
    /// of the main statement. When false, `list` issues the count as a
    /// second statement.
    fn embeds_count(&self) -> bool;

    fn ident(&self, ident: &str) -> String {
        let mut out = String::with_capacity(ident.len() + 2);
        self.push_ident(&mut out, ident);
        out
    }

    /// `"alias"."column"` with both sides quoted.
    fn qualified(&self, alias: &str, column: &str) -> String {
        let mut out = String::new();
        self.push_ident(&mut out, alias);
        out.push('.');
        self.push_ident(&mut out, column);
        out
    }

    fn literal(&self, value: &Value) -> String {
        let mut out = String::new();
        self.push_literal(&mut out, value);
        out
    }
}

/// Numeric and null literal forms shared by both implementations.
pub(crate) fn push_common_literal(out: &mut String, value: &Value) -> bool {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(true) => out.push_str("TRUE"),
        Value::Bool(false) => out.push_str("FALSE"),
        Value::I64(v) => out.push_str(&v.to_string()),
        Value::F64(v) => out.push_str(&v.to_string()),
        _ => return false,
    }
    true
}
