use super::compile::Compile;
use super::relation;
use tracing::warn;
use trellis_core::schema::{Column, ColumnKind, Table};
use trellis_core::{Error, ListArgs, Result, Selection};
use trellis_sql::{Dialect, Fragment, SelectQuery};

/// Upper bound on lookup chains and nested relation selections. Exceeding
/// it is a compile error, so a cyclic lookup chain can never recurse
/// unboundedly.
pub(crate) const MAX_NESTING_DEPTH: usize = 8;

/// What a single column contributed to the projection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EmitShape {
    /// False when the column produced no projection (broken or omitted
    /// formula).
    pub emitted: bool,
    /// True when the value is a JSON array (has-many / many-to-many, or a
    /// lookup through one).
    pub is_array: bool,
}

impl EmitShape {
    pub(crate) fn scalar() -> Self {
        Self {
            emitted: true,
            is_array: false,
        }
    }

    pub(crate) fn skipped() -> Self {
        Self {
            emitted: false,
            is_array: false,
        }
    }
}

/// Emits the projection for one table level: resolves the effective field
/// list, then emits each column with its selection subtree and nested
/// arguments.
pub(crate) fn emit_scope(
    cx: &mut Compile<'_>,
    table: &Table,
    qb: &mut SelectQuery,
    alias: &str,
    selection: &Selection,
    args: &ListArgs,
    depth: usize,
) -> Result<()> {
    let fields = resolve_fields(table, args.fields.as_deref(), selection, cx.strict)?;
    for column in fields {
        emit_column(
            cx,
            table,
            column,
            qb,
            alias,
            selection.child(&column.title),
            args.nested(&column.title),
            depth,
        )?;
    }
    Ok(())
}

/// The columns to project at one level.
///
/// An explicit `fields` argument wins: `*` means every column, otherwise a
/// comma-separated title list resolved against the table (unknown titles
/// error in strict mode, drop with a warning otherwise). Without one, a
/// `Fields` selection names the columns and `Primary` falls back to the
/// primary key plus display column.
pub(crate) fn resolve_fields<'t>(
    table: &'t Table,
    fields_arg: Option<&str>,
    selection: &Selection,
    strict: bool,
) -> Result<Vec<&'t Column>> {
    let titles: Vec<&str> = match fields_arg {
        Some(spec) if spec.trim() == "*" => return Ok(table.columns.iter().collect()),
        Some(spec) => spec
            .split(',')
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .collect(),
        None => match selection {
            Selection::Primary => return Ok(table.default_fields()),
            Selection::Fields(_) => selection.titles(),
        },
    };

    let mut fields = Vec::with_capacity(titles.len());
    for title in titles {
        match table.column_by_title(title) {
            Some(column) => fields.push(column),
            None if strict => return Err(Error::unknown_column(&table.title, title)),
            None => warn!(table = %table.title, title, "dropping unknown column"),
        }
    }
    Ok(fields)
}

/// Emits the projection for one column, dispatching on its kind. Virtual
/// columns (links, lookups) add lateral joins to `qb` as a side effect.
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_column(
    cx: &mut Compile<'_>,
    table: &Table,
    column: &Column,
    qb: &mut SelectQuery,
    alias: &str,
    selection: &Selection,
    args: Option<&ListArgs>,
    depth: usize,
) -> Result<EmitShape> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::nesting_depth(depth, MAX_NESTING_DEPTH));
    }
    let dialect = cx.dialect;

    match &column.kind {
        ColumnKind::Scalar => {
            project(qb, dialect, &dialect.qualified(alias, &column.name), &column.title);
            Ok(EmitShape::scalar())
        }
        ColumnKind::Temporal(temporal) => {
            let expr = dialect.qualified(alias, &column.name);
            let expr = if temporal.with_time_zone {
                expr
            } else {
                dialect.utc_expr(&expr)
            };
            project(qb, dialect, &expr, &column.title);
            Ok(EmitShape::scalar())
        }
        ColumnKind::Binary(binary) => {
            let expr = dialect.binary_expr(&dialect.qualified(alias, &column.name), binary.format);
            project(qb, dialect, &expr, &column.title);
            Ok(EmitShape::scalar())
        }
        ColumnKind::Attachment => {
            let expr = dialect.json_cast(&dialect.qualified(alias, &column.name));
            project(qb, dialect, &expr, &column.title);
            Ok(EmitShape::scalar())
        }
        ColumnKind::Formula(formula) => {
            if formula.error.is_some() {
                return Ok(EmitShape::skipped());
            }
            match cx.hooks.formula_select(column, formula, &cx.scope(), alias)? {
                Some(expr) => {
                    let mut sql = String::new();
                    sql.push('(');
                    sql.push_str(&expr.sql);
                    sql.push_str(") AS ");
                    dialect.push_ident(&mut sql, &column.title);
                    qb.select(Fragment::with_binds(sql, expr.binds));
                    Ok(EmitShape::scalar())
                }
                None => Ok(EmitShape::skipped()),
            }
        }
        ColumnKind::Rollup(rollup) => {
            let expr = cx.hooks.rollup_select(column, rollup, &cx.scope(), alias)?;
            let mut sql = String::new();
            sql.push('(');
            sql.push_str(&expr.sql);
            sql.push_str(") AS ");
            dialect.push_ident(&mut sql, &column.title);
            qb.select(Fragment::with_binds(sql, expr.binds));
            Ok(EmitShape::scalar())
        }
        ColumnKind::ValueProxy(proxy) => {
            // Redirect to the referenced column, keeping this column's
            // title on the output.
            let mut proxied = cx.schema.column(proxy.value).clone();
            proxied.title = column.title.clone();
            emit_column(cx, table, &proxied, qb, alias, selection, args, depth + 1)
        }
        ColumnKind::Link(link) => {
            relation::emit_link(cx, column, link, qb, alias, selection, args, depth)
        }
        ColumnKind::Lookup(lookup) => relation::emit_lookup(cx, column, lookup, qb, alias, depth),
    }
}

fn project(qb: &mut SelectQuery, dialect: &dyn Dialect, expr: &str, title: &str) {
    let mut sql = String::with_capacity(expr.len() + title.len() + 6);
    sql.push_str(expr);
    sql.push_str(" AS ");
    dialect.push_ident(&mut sql, title);
    qb.select(Fragment::raw(sql));
}
