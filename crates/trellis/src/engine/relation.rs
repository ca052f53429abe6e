use super::compile::Compile;
use super::emit::{self, EmitShape};
use tracing::warn;
use trellis_core::filter::FilterTree;
use trellis_core::schema::{Cardinality, Column, Link, Lookup, Table};
use trellis_core::{Error, ListArgs, Result, Selection};
use trellis_sql::{Bind, Dialect, Fragment, SelectQuery};

/// Wraps a subquery as a lateral join. Every relation and lookup becomes
/// one of these; the body correlates with the outer row, so the join must
/// be lateral, and `LEFT OUTER ... ON TRUE` keeps parents without children.
fn lateral(dialect: &dyn Dialect, body: &SelectQuery, alias: &str) -> Fragment {
    let rendered = body.render(dialect);
    let mut sql = String::with_capacity(rendered.sql.len() + 40);
    sql.push_str("LEFT OUTER JOIN LATERAL (");
    sql.push_str(&rendered.sql);
    sql.push_str(") AS ");
    dialect.push_ident(&mut sql, alias);
    sql.push_str(" ON TRUE");
    Fragment::with_binds(sql, rendered.binds)
}

/// Compiles a link column into a lateral join producing one JSON value per
/// outer row: an object for belongs-to / one-to-one, an array of objects
/// for has-many / many-to-many.
///
/// Three layers, innermost out: a correlated row source (with the nested
/// filter, sort, and page for *-to-many), a projection layer emitting the
/// related fields, and a JSON wrapper aggregating them under the link
/// column's title.
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_link(
    cx: &mut Compile<'_>,
    column: &Column,
    link: &Link,
    qb: &mut SelectQuery,
    root_alias: &str,
    selection: &Selection,
    args: Option<&ListArgs>,
    depth: usize,
) -> Result<EmitShape> {
    let dialect = cx.dialect;
    let schema = cx.schema;
    let related = schema.table(link.target);
    let default_args = ListArgs::default();
    let args = args.unwrap_or(&default_args);
    let is_many = link.cardinality.is_many();

    let filters = nested_filters(cx, args, related)?;
    let fields = emit::resolve_fields(related, args.fields.as_deref(), selection, cx.strict)?;

    let inner_alias = cx.alias();
    let source = match link.cardinality {
        Cardinality::BelongsTo | Cardinality::OneToOne => {
            let parent = schema.column(link.parent_column);
            let child = schema.column(link.child_column);
            let mut q = SelectQuery::from_table(&related.name);
            q.filter(Fragment::raw(format!(
                "{} = {}",
                dialect.ident(&parent.name),
                dialect.qualified(root_alias, &child.name)
            )));
            for tree in &filters {
                q.filter(cx.hooks.filter_sql(tree, &cx.scope(), None)?);
            }
            q
        }
        Cardinality::HasMany => {
            let parent = schema.column(link.parent_column);
            let child = schema.column(link.child_column);
            let mut q = SelectQuery::from_table(&related.name);
            q.filter(Fragment::raw(format!(
                "{} = {}",
                dialect.ident(&child.name),
                dialect.qualified(root_alias, &parent.name)
            )));
            for tree in &filters {
                q.filter(cx.hooks.filter_sql(tree, &cx.scope(), None)?);
            }
            apply_nested_sorts(cx, &mut q, args, related, None)?;
            q.limit(Bind::Const(args.limit().into()));
            q.offset(Bind::Const(args.offset().into()));
            q
        }
        Cardinality::ManyToMany => {
            let through = link.through.as_ref().ok_or_else(|| {
                anyhow::anyhow!(
                    "many-to-many link {:?} has no associative table",
                    column.title
                )
            })?;
            let assoc_table = schema.table(through.table);
            let child_link = schema.column(through.child_link);
            let parent_link = schema.column(through.parent_link);
            let child = schema.column(link.child_column);
            let parent = schema.column(link.parent_column);

            let assoc_alias = cx.alias();
            let mut assoc = SelectQuery::from_table_as(&assoc_table.name, &assoc_alias);
            assoc.filter(Fragment::raw(format!(
                "{} = {}",
                dialect.qualified(&assoc_alias, &child_link.name),
                dialect.qualified(root_alias, &child.name)
            )));

            let mid_alias = cx.alias();
            let rel_alias = cx.alias();
            let mut q = SelectQuery::from_subquery(assoc, &mid_alias);
            q.select(Fragment::raw(format!("{}.*", dialect.ident(&rel_alias))));
            q.join(Fragment::raw(format!(
                "LEFT JOIN {} AS {} ON {} = {}",
                dialect.ident(&related.name),
                dialect.ident(&rel_alias),
                dialect.qualified(&rel_alias, &parent.name),
                dialect.qualified(&mid_alias, &parent_link.name)
            )));
            for tree in &filters {
                q.filter(cx.hooks.filter_sql(tree, &cx.scope(), Some(&rel_alias))?);
            }
            apply_nested_sorts(cx, &mut q, args, related, Some(&rel_alias))?;
            q.limit(Bind::Const(args.limit().into()));
            q.offset(Bind::Const(args.offset().into()));
            q
        }
    };

    // Projection layer. Related fields may themselves be links or lookups;
    // emit_column recurses and hangs further laterals off this layer.
    let mut projected = SelectQuery::from_subquery(source, &inner_alias);
    let wrap_alias = cx.alias();
    let mut pairs = Vec::with_capacity(fields.len());
    for field in &fields {
        let shape = emit::emit_column(
            cx,
            related,
            field,
            &mut projected,
            &inner_alias,
            selection.child(&field.title),
            args.nested(&field.title),
            depth + 1,
        )?;
        if shape.emitted {
            pairs.push((
                field.title.clone(),
                dialect.qualified(&wrap_alias, &field.title),
            ));
        }
    }

    let join_alias = cx.alias();
    let mut wrapper = SelectQuery::from_subquery(projected, &wrap_alias);
    let json_expr = if is_many {
        dialect.json_agg_objects(&pairs)
    } else {
        dialect.json_object(&pairs)
    };
    wrapper.select(Fragment::raw(format!(
        "{json_expr} AS {}",
        dialect.ident(&column.title)
    )));

    qb.join(lateral(dialect, &wrapper, &join_alias));
    qb.select(Fragment::raw(dialect.qualified(&join_alias, &column.title)));

    Ok(EmitShape {
        emitted: true,
        is_array: is_many,
    })
}

/// Compiles a lookup column: the traversed link's row source, the target
/// column projected through it (recursing for lookup chains), and a
/// wrapper shaping the result. A lookup through a *-to-many link
/// aggregates into an array; when the target is itself an array the
/// wrapper flattens one level by unnesting and reaggregating.
pub(crate) fn emit_lookup(
    cx: &mut Compile<'_>,
    column: &Column,
    lookup: &Lookup,
    qb: &mut SelectQuery,
    root_alias: &str,
    depth: usize,
) -> Result<EmitShape> {
    let dialect = cx.dialect;
    let schema = cx.schema;
    let link_column = schema.column(lookup.link);
    let link = link_column.kind.as_link().ok_or_else(|| {
        anyhow::anyhow!(
            "lookup {:?} traverses {:?}, which is not a link",
            column.title,
            link_column.title
        )
    })?;
    let related = schema.table(link.target);
    let target = schema.column(lookup.target);
    let is_many = link.cardinality.is_many();

    let rel_alias = cx.alias();
    let mut source = lookup_source(cx, link, root_alias, &rel_alias)?;

    let shape = emit::emit_column(
        cx,
        related,
        target,
        &mut source,
        &rel_alias,
        &Selection::Primary,
        None,
        depth + 1,
    )?;
    if !shape.emitted {
        return Ok(EmitShape::skipped());
    }

    let wrap_alias = cx.alias();
    let join_alias = cx.alias();
    let mut wrapper = SelectQuery::from_subquery(source, &wrap_alias);
    let value = dialect.qualified(&wrap_alias, &target.title);

    let is_array = if !is_many {
        wrapper.select(Fragment::raw(format!(
            "{value} AS {}",
            dialect.ident(&column.title)
        )));
        shape.is_array
    } else if shape.is_array {
        // Array of arrays: explode the inner arrays and reaggregate so the
        // lookup yields a single flat array.
        let elem_alias = cx.alias();
        wrapper.from_item(Fragment::raw(dialect.json_unnest(&value, &elem_alias)));
        wrapper.select(Fragment::raw(format!(
            "{} AS {}",
            dialect.json_agg(&dialect.json_unnest_element(&elem_alias)),
            dialect.ident(&column.title)
        )));
        true
    } else {
        wrapper.select(Fragment::raw(format!(
            "{} AS {}",
            dialect.json_agg(&value),
            dialect.ident(&column.title)
        )));
        true
    };

    qb.join(lateral(dialect, &wrapper, &join_alias));
    qb.select(Fragment::raw(dialect.qualified(&join_alias, &column.title)));

    Ok(EmitShape {
        emitted: true,
        is_array,
    })
}

/// The correlated row source for a lookup traversal. Unlike a link column,
/// a lookup applies no nested pagination: it sees every related row.
fn lookup_source(
    cx: &mut Compile<'_>,
    link: &Link,
    root_alias: &str,
    rel_alias: &str,
) -> Result<SelectQuery> {
    let dialect = cx.dialect;
    let schema = cx.schema;
    let related = schema.table(link.target);

    match link.cardinality {
        Cardinality::BelongsTo | Cardinality::OneToOne => {
            let parent = schema.column(link.parent_column);
            let child = schema.column(link.child_column);
            let mut q = SelectQuery::from_table_as(&related.name, rel_alias);
            q.filter(Fragment::raw(format!(
                "{} = {}",
                dialect.qualified(rel_alias, &parent.name),
                dialect.qualified(root_alias, &child.name)
            )));
            Ok(q)
        }
        Cardinality::HasMany => {
            let parent = schema.column(link.parent_column);
            let child = schema.column(link.child_column);
            let mut q = SelectQuery::from_table_as(&related.name, rel_alias);
            q.filter(Fragment::raw(format!(
                "{} = {}",
                dialect.qualified(rel_alias, &child.name),
                dialect.qualified(root_alias, &parent.name)
            )));
            Ok(q)
        }
        Cardinality::ManyToMany => {
            let through = link.through.as_ref().ok_or_else(|| {
                anyhow::anyhow!("many-to-many link has no associative table")
            })?;
            let assoc_table = schema.table(through.table);
            let child_link = schema.column(through.child_link);
            let parent_link = schema.column(through.parent_link);
            let child = schema.column(link.child_column);
            let parent = schema.column(link.parent_column);

            let assoc_alias = cx.alias();
            let mut assoc = SelectQuery::from_table_as(&assoc_table.name, &assoc_alias);
            assoc.filter(Fragment::raw(format!(
                "{} = {}",
                dialect.qualified(&assoc_alias, &child_link.name),
                dialect.qualified(root_alias, &child.name)
            )));

            let mid_alias = cx.alias();
            let mut q = SelectQuery::from_subquery(assoc, &mid_alias);
            q.join(Fragment::raw(format!(
                "LEFT JOIN {} AS {} ON {} = {}",
                dialect.ident(&related.name),
                dialect.ident(rel_alias),
                dialect.qualified(rel_alias, &parent.name),
                dialect.qualified(&mid_alias, &parent_link.name)
            )));
            Ok(q)
        }
    }
}

fn nested_filters(
    cx: &Compile<'_>,
    args: &ListArgs,
    related: &Table,
) -> Result<Vec<FilterTree>> {
    let mut filters = args.filter_arr.clone();
    if let Some(tree) = cx.parse_where(args.where_clause.as_deref(), related)? {
        filters.push(tree);
    }
    Ok(filters)
}

fn apply_nested_sorts(
    cx: &Compile<'_>,
    q: &mut SelectQuery,
    args: &ListArgs,
    related: &Table,
    alias: Option<&str>,
) -> Result<()> {
    let mut sorts = args.sort_arr.clone();
    if let Some(clause) = &args.sort {
        sorts.extend(cx.parse_sort(clause, related)?);
    }
    for spec in &sorts {
        let column = cx.schema.column(spec.column);
        if column.is_virtual() {
            if cx.strict {
                return Err(Error::invalid_sort(format!(
                    "cannot sort by virtual column {:?}",
                    column.title
                )));
            }
            warn!(column = %column.title, "dropping sort on virtual column");
            continue;
        }
        let expr = match alias {
            Some(alias) => cx.dialect.qualified(alias, &column.name),
            None => cx.dialect.ident(&column.name),
        };
        q.order_by(Fragment::raw(format!("{expr} {}", spec.direction.as_sql())));
    }
    Ok(())
}
