mod cache;
mod compile;
mod emit;
mod relation;

pub use cache::NoCache;

use cache::{cache_key, table_prefix, COUNT_COLUMN};
use compile::Compile;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use trellis_core::filter::{SortDirection, SortSpec};
use trellis_core::schema::{Table, TableId};
use trellis_core::{
    Driver, EngineFamily, Error, ListArgs, QueryCache, Result, Row, RowKey, Schema, Selection,
    Value, View,
};
use trellis_sql::{
    template, AliasGenerator, Bind, CompiledQuery, Dialect, Fragment, Mysql, Postgres,
    SelectQuery, ROOT_ALIAS,
};

use crate::hooks::{QueryHooks, UnsupportedHooks};

/// The query compiler. One instance per (schema, database) pair; cheap to
/// clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct Engine {
    schema: Arc<Schema>,
    dialect: Arc<dyn Dialect>,
    driver: Arc<dyn Driver>,
    cache: Arc<dyn QueryCache>,
    hooks: Arc<dyn QueryHooks>,
    caching: bool,
}

pub struct EngineBuilder {
    schema: Option<Arc<Schema>>,
    dialect: Option<Arc<dyn Dialect>>,
    driver: Option<Arc<dyn Driver>>,
    cache: Option<Arc<dyn QueryCache>>,
    hooks: Option<Arc<dyn QueryHooks>>,
    caching: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            schema: None,
            dialect: None,
            driver: None,
            cache: None,
            hooks: None,
            caching: true,
        }
    }
}

impl EngineBuilder {
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Some(Arc::new(dialect));
        self
    }

    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn QueryHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Disables template caching; every request compiles fresh.
    pub fn disable_cache(mut self) -> Self {
        self.caching = false;
        self
    }

    /// Fails fast when the driver's engine family has no dialect adapter
    /// or does not match an explicitly chosen dialect.
    pub fn build(self) -> Result<Engine> {
        let schema = self
            .schema
            .ok_or_else(|| anyhow::anyhow!("engine requires a schema"))?;
        let driver = self
            .driver
            .ok_or_else(|| anyhow::anyhow!("engine requires a driver"))?;

        let dialect: Arc<dyn Dialect> = match self.dialect {
            Some(dialect) => dialect,
            None => match driver.family() {
                EngineFamily::Postgres => Arc::new(Postgres),
                EngineFamily::Mysql => Arc::new(Mysql),
                other => return Err(Error::dialect_mismatch("postgres or mysql", other)),
            },
        };
        if dialect.family() != driver.family() {
            return Err(Error::dialect_mismatch(dialect.family(), driver.family()));
        }

        let caching = self.caching && self.cache.is_some();
        Ok(Engine {
            schema,
            dialect,
            driver,
            cache: self.cache.unwrap_or_else(|| Arc::new(NoCache)),
            hooks: self.hooks.unwrap_or_else(|| Arc::new(UnsupportedHooks)),
            caching,
        })
    }
}

/// A single-row fetch by primary key.
#[derive(Debug, Clone)]
pub struct ReadRequest<'a> {
    pub table: TableId,
    pub view: Option<&'a View>,
    pub selection: Selection,
    pub args: ListArgs,
    pub key: RowKey,
    pub strict: bool,
}

impl<'a> ReadRequest<'a> {
    pub fn new(table: impl Into<TableId>, key: impl Into<RowKey>) -> Self {
        Self {
            table: table.into(),
            view: None,
            selection: Selection::Primary,
            args: ListArgs::default(),
            key: key.into(),
            strict: false,
        }
    }

    pub fn view(mut self, view: &'a View) -> Self {
        self.view = Some(view);
        self
    }

    /// Sets the field-selection tree. Like the view, the selection is
    /// configuration rather than an ad-hoc argument: templates are keyed by
    /// (table, view, operation), so callers must pass the same selection
    /// for the same key.
    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn args(mut self, args: ListArgs) -> Self {
        self.args = args;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// A paginated page fetch.
#[derive(Debug, Clone)]
pub struct ListRequest<'a> {
    pub table: TableId,
    pub view: Option<&'a View>,
    pub selection: Selection,
    pub args: ListArgs,
    pub strict: bool,
}

impl<'a> ListRequest<'a> {
    pub fn new(table: impl Into<TableId>) -> Self {
        Self {
            table: table.into(),
            view: None,
            selection: Selection::Primary,
            args: ListArgs::default(),
            strict: false,
        }
    }

    pub fn view(mut self, view: &'a View) -> Self {
        self.view = Some(view);
        self
    }

    /// Sets the field-selection tree. See
    /// [`ReadRequest::selection`] for the caching contract.
    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn args(mut self, args: ListArgs) -> Self {
        self.args = args;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// The `list` envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub items: Vec<Row>,
    /// Total row count under the same filters, ignoring pagination.
    pub count: u64,
    pub limit: u64,
    pub offset: u64,
    /// Wall-clock duration of the data round trip.
    pub timing_ms: f64,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn table(&self, id: TableId) -> Result<&Table> {
        self.schema
            .get_table(id)
            .ok_or_else(|| anyhow::anyhow!("unknown table {id:?}").into())
    }

    /// Fetches one row by primary key, or `None` when it does not exist.
    pub async fn read(&self, req: ReadRequest<'_>) -> Result<Option<Row>> {
        let table = self.table(req.table)?;
        let pk_count = table.primary_key.len();
        if pk_count == 0 {
            return Err(anyhow::anyhow!("table {:?} has no primary key", table.title).into());
        }
        if req.key.len() != pk_count {
            return Err(anyhow::anyhow!(
                "row key has {} values but table {:?} has {pk_count} key columns",
                req.key.len(),
                table.title
            )
            .into());
        }

        let eligible = self.caching && req.args.is_default_shape();
        let key = cache_key(table.id, req.view, "read");

        if eligible {
            if let Some(rows) = self.replay(&key, req.key.values()).await? {
                return Ok(rows.into_iter().next());
            }
        }

        let fragment = self.compile_read(table, &req)?;
        if eligible {
            self.store_template(&key, &fragment).await?;
        }
        let compiled = CompiledQuery::from_fragment(fragment, &*self.dialect);
        let rows = self.execute(&compiled.sql, &compiled.bind_values()).await?;
        Ok(rows.into_iter().next())
    }

    /// Fetches a page of rows plus the total count under the same filters.
    pub async fn list(&self, req: ListRequest<'_>) -> Result<ListResponse> {
        let table = self.table(req.table)?;
        let limit = req.args.limit();
        let offset = req.args.offset();

        let eligible = self.caching && req.args.is_default_shape();
        let key = cache_key(table.id, req.view, "list");

        let started = Instant::now();
        let mut rows = None;
        if eligible {
            rows = self.replay(&key, &[limit.into(), offset.into()]).await?;
        }
        let mut items = match rows {
            Some(rows) => rows,
            None => {
                let fragment = self.compile_list(table, &req, limit, offset)?;
                if eligible {
                    self.store_template(&key, &fragment).await?;
                }
                let compiled = CompiledQuery::from_fragment(fragment, &*self.dialect);
                self.execute(&compiled.sql, &compiled.bind_values()).await?
            }
        };
        let timing_ms = started.elapsed().as_secs_f64() * 1000.0;

        let count = if self.dialect.embeds_count() {
            let mut count = 0;
            for (i, row) in items.iter_mut().enumerate() {
                if let Some(value) = row.remove(COUNT_COLUMN) {
                    if i == 0 {
                        count = count_value(&value);
                    }
                }
            }
            count
        } else {
            let compiled = self.compile_count(table, &req)?;
            let rows = self.execute(&compiled.sql, &compiled.bind_values()).await?;
            rows.first()
                .and_then(|row| row.get(COUNT_COLUMN))
                .map(count_value)
                .unwrap_or(0)
        };

        debug!(
            table = %table.title,
            rows = items.len(),
            count,
            timing_ms,
            "list complete"
        );

        Ok(ListResponse {
            items,
            count,
            limit,
            offset,
            timing_ms,
        })
    }

    /// Drops every cached template for `table`. Call after a schema change.
    pub async fn evict_templates(&self, table: impl Into<TableId>) -> Result<()> {
        self.cache.evict_prefix(&table_prefix(table.into())).await
    }

    fn compile_cx(&self, strict: bool) -> Compile<'_> {
        Compile {
            schema: &self.schema,
            dialect: &*self.dialect,
            hooks: &*self.hooks,
            aliases: AliasGenerator::new(),
            strict,
        }
    }

    fn compile_read(&self, table: &Table, req: &ReadRequest<'_>) -> Result<Fragment> {
        let mut cx = self.compile_cx(req.strict);

        let mut root = SelectQuery::from_table(&table.name);
        root.select(Fragment::raw("*"));
        for (pk, value) in table.primary_keys().zip(req.key.values().iter()) {
            root.filter(Fragment::with_binds(
                format!("{} = ?", cx.dialect.ident(&pk.name)),
                vec![Bind::Runtime(value.clone())],
            ));
        }
        self.apply_root_filters(&cx, &mut root, table, req.view, &req.args, None)?;

        let mut outer = SelectQuery::from_subquery(root, ROOT_ALIAS);
        emit::emit_scope(
            &mut cx,
            table,
            &mut outer,
            ROOT_ALIAS,
            &req.selection,
            &req.args,
            0,
        )?;
        outer.limit(Bind::Const(Value::I64(1)));
        Ok(outer.render(&*self.dialect))
    }

    fn compile_list(
        &self,
        table: &Table,
        req: &ListRequest<'_>,
        limit: u64,
        offset: u64,
    ) -> Result<Fragment> {
        let mut cx = self.compile_cx(req.strict);

        let mut root = SelectQuery::from_table(&table.name);
        root.select(Fragment::raw("*"));
        self.apply_root_filters(&cx, &mut root, table, req.view, &req.args, None)?;

        let sorts = self.resolve_sorts(&cx, table, req.view, &req.args)?;
        for spec in &sorts {
            root.order_by(self.order_fragment(spec, None));
        }
        root.limit(Bind::Runtime(limit.into()));
        root.offset(Bind::Runtime(offset.into()));

        let mut outer = SelectQuery::from_subquery(root, ROOT_ALIAS);
        emit::emit_scope(
            &mut cx,
            table,
            &mut outer,
            ROOT_ALIAS,
            &req.selection,
            &req.args,
            0,
        )?;
        // The laterals make the inner ordering advisory; restate it on the
        // outer statement so the page comes back ordered.
        for spec in &sorts {
            outer.order_by(self.order_fragment(spec, Some(ROOT_ALIAS)));
        }

        if self.dialect.embeds_count() {
            let count = self.count_query(&cx, table, req.view, &req.args, false)?;
            let rendered = count.render(&*self.dialect);
            outer.select(Fragment::with_binds(
                format!("({}) AS {}", rendered.sql, self.dialect.ident(COUNT_COLUMN)),
                rendered.binds,
            ));
        }

        Ok(outer.render(&*self.dialect))
    }

    fn compile_count(&self, table: &Table, req: &ListRequest<'_>) -> Result<CompiledQuery> {
        let cx = self.compile_cx(req.strict);
        let count = self.count_query(&cx, table, req.view, &req.args, true)?;
        Ok(count.to_sql(&*self.dialect))
    }

    /// `SELECT count(*)` under the same root filters as the page query.
    fn count_query(
        &self,
        cx: &Compile<'_>,
        table: &Table,
        view: Option<&View>,
        args: &ListArgs,
        aliased: bool,
    ) -> Result<SelectQuery> {
        let mut query = SelectQuery::from_table(&table.name);
        let projection = if aliased {
            format!("count(*) AS {}", self.dialect.ident(COUNT_COLUMN))
        } else {
            "count(*)".to_string()
        };
        query.select(Fragment::raw(projection));
        self.apply_root_filters(cx, &mut query, table, view, args, None)?;
        Ok(query)
    }

    /// ANDs the three root filter groups: view filters, the structured
    /// filter array, and the parsed `where` string.
    fn apply_root_filters(
        &self,
        cx: &Compile<'_>,
        query: &mut SelectQuery,
        table: &Table,
        view: Option<&View>,
        args: &ListArgs,
        alias: Option<&str>,
    ) -> Result<()> {
        let scope = cx.scope();
        if let Some(view) = view {
            for tree in &view.filters {
                query.filter(self.hooks.filter_sql(tree, &scope, alias)?);
            }
        }
        for tree in &args.filter_arr {
            query.filter(self.hooks.filter_sql(tree, &scope, alias)?);
        }
        if let Some(tree) = cx.parse_where(args.where_clause.as_deref(), table)? {
            query.filter(self.hooks.filter_sql(&tree, &scope, alias)?);
        }
        Ok(())
    }

    /// Requested sorts plus the determinism fallback: when nothing is
    /// requested and the primary key is not database-generated, sort by the
    /// system creation timestamp; the primary key is always appended as the
    /// final tiebreaker.
    fn resolve_sorts(
        &self,
        cx: &Compile<'_>,
        table: &Table,
        view: Option<&View>,
        args: &ListArgs,
    ) -> Result<Vec<SortSpec>> {
        let mut requested: Vec<SortSpec> =
            view.map(|view| view.sorts.clone()).unwrap_or_default();
        requested.extend(args.sort_arr.iter().cloned());
        if let Some(clause) = &args.sort {
            requested.extend(cx.parse_sort(clause, table)?);
        }

        // Virtual columns have no physical name to order by.
        let mut sorts = Vec::with_capacity(requested.len());
        for spec in requested {
            let column = self.schema.column(spec.column);
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
            sorts.push(spec);
        }

        if sorts.is_empty() {
            if let Some(pk) = table.primary_key() {
                if !pk.auto_increment {
                    if let Some(created) = table.created_at() {
                        sorts.push(SortSpec {
                            column: created.id,
                            direction: SortDirection::Asc,
                        });
                    }
                }
            }
        }
        if let Some(pk) = table.primary_key() {
            if !sorts.iter().any(|spec| spec.column == pk.id) {
                sorts.push(SortSpec {
                    column: pk.id,
                    direction: SortDirection::Asc,
                });
            }
        }
        Ok(sorts)
    }

    fn order_fragment(&self, spec: &SortSpec, alias: Option<&str>) -> Fragment {
        let column = self.schema.column(spec.column);
        let expr = match alias {
            Some(alias) => self.dialect.qualified(alias, &column.name),
            None => self.dialect.ident(&column.name),
        };
        Fragment::raw(format!("{expr} {}", spec.direction.as_sql()))
    }

    async fn store_template(&self, key: &str, fragment: &Fragment) -> Result<()> {
        let text = template::make_template(fragment, &*self.dialect);
        self.cache.set(key, &text).await?;
        debug!(key, "stored statement template");
        Ok(())
    }

    /// Runs a cached template with this request's runtime values. A
    /// corrupt entry falls back to recompilation, which overwrites it.
    async fn replay(&self, key: &str, values: &[Value]) -> Result<Option<Vec<Row>>> {
        let Some(text) = self.cache.get(key).await? else {
            debug!(key, "template cache miss");
            return Ok(None);
        };
        let (sql, binds) = match template::hydrate(&text, &*self.dialect, values) {
            Ok(hydrated) => hydrated,
            Err(err) => {
                warn!(key, %err, "discarding unusable template");
                return Ok(None);
            }
        };
        debug!(key, "template cache hit");
        Ok(Some(self.execute(&sql, &binds).await?))
    }

    async fn execute(&self, sql: &str, binds: &[Value]) -> Result<Vec<Row>> {
        debug!(sql, binds = binds.len(), "executing");
        self.driver.execute(sql, binds).await
    }
}

fn count_value(value: &Value) -> u64 {
    match value {
        Value::I64(n) => (*n).max(0) as u64,
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Json(json) => json.as_u64().unwrap_or(0),
        _ => 0,
    }
}
