//! The seam between the compiler and externally owned query grammar.
//!
//! Filter parsing, predicate building, formula translation, and rollup
//! aggregates all live outside the compiler; this trait is how the
//! compiler asks for them.

use std::fmt;
use trellis_core::filter::{FilterTree, SortSpec};
use trellis_core::schema::{Column, Formula, Rollup, Table};
use trellis_core::{Error, Result, Schema};
use trellis_sql::{Dialect, Fragment};

/// Schema and dialect handed to every hook call.
pub struct SqlScope<'a> {
    pub schema: &'a Schema,
    pub dialect: &'a dyn Dialect,
}

pub trait QueryHooks: Send + Sync + fmt::Debug {
    /// Parses an ad-hoc `where` string against `table`. Errors surface to
    /// the caller in strict mode and downgrade to a warning otherwise.
    fn parse_filter(
        &self,
        clause: &str,
        table: &Table,
        schema: &Schema,
    ) -> Result<Option<FilterTree>>;

    /// Parses an ad-hoc `sort` string against `table`.
    fn parse_sort(&self, clause: &str, table: &Table, schema: &Schema) -> Result<Vec<SortSpec>>;

    /// Renders a filter tree as a WHERE condition. Column references are
    /// qualified with `alias` when one is given. Bind values must be
    /// `Bind::Const`: filters are part of the statement shape and get
    /// inlined into cached templates.
    fn filter_sql(
        &self,
        tree: &FilterTree,
        scope: &SqlScope<'_>,
        alias: Option<&str>,
    ) -> Result<Fragment>;

    /// The select expression for a formula column, or `None` to omit it.
    fn formula_select(
        &self,
        column: &Column,
        formula: &Formula,
        scope: &SqlScope<'_>,
        alias: &str,
    ) -> Result<Option<Fragment>>;

    /// The aggregate select expression for a rollup column.
    fn rollup_select(
        &self,
        column: &Column,
        rollup: &Rollup,
        scope: &SqlScope<'_>,
        alias: &str,
    ) -> Result<Fragment>;
}

/// Hooks for deployments without a filter grammar or computed columns:
/// every request that needs one fails with the matching error.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedHooks;

impl QueryHooks for UnsupportedHooks {
    fn parse_filter(
        &self,
        _clause: &str,
        _table: &Table,
        _schema: &Schema,
    ) -> Result<Option<FilterTree>> {
        Err(Error::invalid_filter("no filter parser configured"))
    }

    fn parse_sort(&self, _clause: &str, _table: &Table, _schema: &Schema) -> Result<Vec<SortSpec>> {
        Err(Error::invalid_sort("no sort parser configured"))
    }

    fn filter_sql(
        &self,
        _tree: &FilterTree,
        _scope: &SqlScope<'_>,
        _alias: Option<&str>,
    ) -> Result<Fragment> {
        Err(Error::invalid_filter("no filter builder configured"))
    }

    fn formula_select(
        &self,
        column: &Column,
        _formula: &Formula,
        _scope: &SqlScope<'_>,
        _alias: &str,
    ) -> Result<Option<Fragment>> {
        Err(Error::formula(format!(
            "no formula translator configured for column {:?}",
            column.title
        )))
    }

    fn rollup_select(
        &self,
        column: &Column,
        _rollup: &Rollup,
        _scope: &SqlScope<'_>,
        _alias: &str,
    ) -> Result<Fragment> {
        Err(Error::formula(format!(
            "no rollup builder configured for column {:?}",
            column.title
        )))
    }
}
