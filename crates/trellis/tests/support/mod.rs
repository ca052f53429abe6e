#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use trellis::hooks::{QueryHooks, SqlScope};
use trellis::{Engine, EngineFamily, Error, Mysql, Postgres};
use trellis_core::filter::{CompareOp, FilterTree, LogicalOp, SortDirection, SortSpec};
use trellis_core::schema::{
    Binary, BinaryFormat, Cardinality, Column, ColumnId, ColumnKind, Formula, Link, Lookup,
    Rollup, Table, TableId, Temporal, Through, ValueProxy,
};
use trellis_core::{async_trait, Driver, QueryCache, Result, Row, Schema, Value};
use trellis_sql::{Bind, Fragment};

pub const COUNTRY: usize = 0;
pub const CITY: usize = 1;
pub const TAG: usize = 2;
pub const CITY_TAG: usize = 3;
pub const TRACK: usize = 4;

fn column(table: usize, index: usize, title: &str, name: &str, kind: ColumnKind) -> Column {
    Column {
        id: ColumnId {
            table: TableId(table),
            index,
        },
        name: name.to_string(),
        title: title.to_string(),
        kind,
        auto_increment: false,
        system: false,
    }
}

fn id(table: usize, index: usize) -> ColumnId {
    ColumnId {
        table: TableId(table),
        index,
    }
}

/// Countries with has-many cities, cities with a belongs-to country and
/// many-to-many tags, plus lookups in both directions.
pub fn fixture_schema() -> Schema {
    let country = Table {
        id: TableId(COUNTRY),
        name: "countries".into(),
        title: "Country".into(),
        columns: vec![
            Column {
                auto_increment: true,
                ..column(COUNTRY, 0, "Id", "id", ColumnKind::Scalar)
            },
            column(COUNTRY, 1, "Title", "title", ColumnKind::Scalar),
            Column {
                system: true,
                ..column(
                    COUNTRY,
                    2,
                    "CreatedAt",
                    "created_at",
                    ColumnKind::Temporal(Temporal {
                        with_time_zone: false,
                    }),
                )
            },
            column(
                COUNTRY,
                3,
                "CityList",
                "",
                ColumnKind::Link(Link {
                    cardinality: Cardinality::HasMany,
                    target: TableId(CITY),
                    parent_column: id(COUNTRY, 0),
                    child_column: id(CITY, 2),
                    through: None,
                }),
            ),
            column(
                COUNTRY,
                4,
                "CityNames",
                "",
                ColumnKind::Lookup(Lookup {
                    link: id(COUNTRY, 3),
                    target: id(CITY, 1),
                }),
            ),
            column(
                COUNTRY,
                5,
                "CityCount",
                "",
                ColumnKind::Rollup(Rollup {
                    link: id(COUNTRY, 3),
                    target: id(CITY, 0),
                    function: "count".into(),
                }),
            ),
            column(
                COUNTRY,
                6,
                "CityTags",
                "",
                ColumnKind::Lookup(Lookup {
                    link: id(COUNTRY, 3),
                    target: id(CITY, 6),
                }),
            ),
        ],
        primary_key: vec![0],
        display_column: Some(1),
    };

    let city = Table {
        id: TableId(CITY),
        name: "cities".into(),
        title: "City".into(),
        columns: vec![
            Column {
                auto_increment: true,
                ..column(CITY, 0, "Id", "id", ColumnKind::Scalar)
            },
            column(CITY, 1, "Title", "title", ColumnKind::Scalar),
            column(CITY, 2, "CountryId", "country_id", ColumnKind::Scalar),
            column(
                CITY,
                3,
                "Country",
                "",
                ColumnKind::Link(Link {
                    cardinality: Cardinality::BelongsTo,
                    target: TableId(COUNTRY),
                    parent_column: id(COUNTRY, 0),
                    child_column: id(CITY, 2),
                    through: None,
                }),
            ),
            column(
                CITY,
                4,
                "CountryName",
                "",
                ColumnKind::Lookup(Lookup {
                    link: id(CITY, 3),
                    target: id(COUNTRY, 1),
                }),
            ),
            column(CITY, 5, "Population", "population", ColumnKind::Scalar),
            column(
                CITY,
                6,
                "Tags",
                "",
                ColumnKind::Link(Link {
                    cardinality: Cardinality::ManyToMany,
                    target: TableId(TAG),
                    parent_column: id(TAG, 0),
                    child_column: id(CITY, 0),
                    through: Some(Through {
                        table: TableId(CITY_TAG),
                        child_link: id(CITY_TAG, 0),
                        parent_link: id(CITY_TAG, 1),
                    }),
                }),
            ),
            column(
                CITY,
                7,
                "Barcode",
                "",
                ColumnKind::ValueProxy(ValueProxy { value: id(CITY, 1) }),
            ),
            column(
                CITY,
                8,
                "Motto",
                "",
                ColumnKind::Formula(Formula {
                    expression: "upper('city')".into(),
                    error: None,
                }),
            ),
            column(
                CITY,
                9,
                "BrokenFormula",
                "",
                ColumnKind::Formula(Formula {
                    expression: "1 +".into(),
                    error: Some("incomplete expression".into()),
                }),
            ),
            column(CITY, 10, "Cover", "cover", ColumnKind::Attachment),
            column(
                CITY,
                11,
                "Blob",
                "blob",
                ColumnKind::Binary(Binary {
                    format: BinaryFormat::Hex,
                }),
            ),
        ],
        primary_key: vec![0],
        display_column: Some(1),
    };

    let tag = Table {
        id: TableId(TAG),
        name: "tags".into(),
        title: "Tag".into(),
        columns: vec![
            column(TAG, 0, "Id", "id", ColumnKind::Scalar),
            column(TAG, 1, "Title", "title", ColumnKind::Scalar),
            Column {
                system: true,
                ..column(
                    TAG,
                    2,
                    "CreatedAt",
                    "created_at",
                    ColumnKind::Temporal(Temporal {
                        with_time_zone: false,
                    }),
                )
            },
        ],
        primary_key: vec![0],
        display_column: Some(1),
    };

    let city_tag = Table {
        id: TableId(CITY_TAG),
        name: "city_tags".into(),
        title: "CityTag".into(),
        columns: vec![
            column(CITY_TAG, 0, "CityId", "city_id", ColumnKind::Scalar),
            column(CITY_TAG, 1, "TagId", "tag_id", ColumnKind::Scalar),
        ],
        primary_key: vec![],
        display_column: None,
    };

    // Composite primary key.
    let track = Table {
        id: TableId(TRACK),
        name: "album_tracks".into(),
        title: "Track".into(),
        columns: vec![
            column(TRACK, 0, "AlbumId", "album_id", ColumnKind::Scalar),
            column(TRACK, 1, "TrackNo", "track_no", ColumnKind::Scalar),
            column(TRACK, 2, "Title", "title", ColumnKind::Scalar),
        ],
        primary_key: vec![0, 1],
        display_column: Some(2),
    };

    Schema::from_tables(vec![country, city, tag, city_tag, track]).unwrap()
}

#[derive(Debug)]
pub struct RecordingDriver {
    family: EngineFamily,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<Vec<Vec<Row>>>,
}

impl RecordingDriver {
    pub fn new(family: EngineFamily) -> Arc<Self> {
        Arc::new(Self {
            family,
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        })
    }

    /// Queues rows for the next execution; further executions return no
    /// rows.
    pub fn push_response(&self, rows: Vec<Row>) {
        self.responses.lock().unwrap().push(rows);
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_sql(&self) -> String {
        self.calls.lock().unwrap().last().unwrap().0.clone()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn family(&self) -> EngineFamily {
        self.family
    }

    async fn execute(&self, sql: &str, binds: &[Value]) -> Result<Vec<Row>> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), binds.to_vec()));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(responses.remove(0))
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    sets: Mutex<usize>,
}

impl MemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_count(&self) -> usize {
        *self.sets.lock().unwrap()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl QueryCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, template: &str) -> Result<()> {
        *self.sets.lock().unwrap() += 1;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), template.to_string());
        Ok(())
    }

    async fn evict_prefix(&self, prefix: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

/// Hooks with a toy `Title=Value` filter grammar and `-Title,Other` sorts,
/// enough to exercise every hook path.
#[derive(Debug, Default)]
pub struct TestHooks;

impl QueryHooks for TestHooks {
    fn parse_filter(
        &self,
        clause: &str,
        table: &Table,
        _schema: &Schema,
    ) -> Result<Option<FilterTree>> {
        let (title, value) = clause
            .split_once('=')
            .ok_or_else(|| Error::invalid_filter(clause))?;
        let column = table
            .column_by_title(title.trim())
            .ok_or_else(|| Error::unknown_column(&table.title, title.trim()))?;
        Ok(Some(FilterTree::cmp(
            column.id,
            CompareOp::Eq,
            value.trim(),
        )))
    }

    fn parse_sort(&self, clause: &str, table: &Table, _schema: &Schema) -> Result<Vec<SortSpec>> {
        clause
            .split(',')
            .map(|item| {
                let item = item.trim();
                let (direction, title) = match item.strip_prefix('-') {
                    Some(title) => (SortDirection::Desc, title),
                    None => (SortDirection::Asc, item),
                };
                let column = table
                    .column_by_title(title)
                    .ok_or_else(|| Error::unknown_column(&table.title, title))?;
                Ok(SortSpec {
                    column: column.id,
                    direction,
                })
            })
            .collect()
    }

    fn filter_sql(
        &self,
        tree: &FilterTree,
        scope: &SqlScope<'_>,
        alias: Option<&str>,
    ) -> Result<Fragment> {
        match tree {
            FilterTree::Cmp { column, op, value } => {
                let col = scope.schema.column(*column);
                let expr = match alias {
                    Some(alias) => scope.dialect.qualified(alias, &col.name),
                    None => scope.dialect.ident(&col.name),
                };
                let op_sql = match op {
                    CompareOp::Eq => "=",
                    CompareOp::Neq => "<>",
                    CompareOp::Gt => ">",
                    CompareOp::Ge => ">=",
                    CompareOp::Lt => "<",
                    CompareOp::Le => "<=",
                    CompareOp::Like => "LIKE",
                    CompareOp::IsNull => return Ok(Fragment::raw(format!("{expr} IS NULL"))),
                    CompareOp::IsNotNull => {
                        return Ok(Fragment::raw(format!("{expr} IS NOT NULL")))
                    }
                };
                Ok(Fragment::with_binds(
                    format!("{expr} {op_sql} ?"),
                    vec![Bind::Const(value.clone())],
                ))
            }
            FilterTree::Group { op, children } => {
                let joiner = match op {
                    LogicalOp::And => " AND ",
                    LogicalOp::Or => " OR ",
                };
                let mut sql = String::new();
                let mut binds = Vec::new();
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(joiner);
                    }
                    let frag = self.filter_sql(child, scope, alias)?;
                    sql.push('(');
                    sql.push_str(&frag.sql);
                    sql.push(')');
                    binds.extend(frag.binds);
                }
                Ok(Fragment::with_binds(sql, binds))
            }
        }
    }

    fn formula_select(
        &self,
        _column: &Column,
        formula: &Formula,
        _scope: &SqlScope<'_>,
        _alias: &str,
    ) -> Result<Option<Fragment>> {
        if formula.expression.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Fragment::raw(formula.expression.clone())))
        }
    }

    fn rollup_select(
        &self,
        _column: &Column,
        rollup: &Rollup,
        scope: &SqlScope<'_>,
        alias: &str,
    ) -> Result<Fragment> {
        let link_column = scope.schema.column(rollup.link);
        let link = link_column.kind.expect_link();
        let related = scope.schema.table(link.target);
        let parent = scope.schema.column(link.parent_column);
        let child = scope.schema.column(link.child_column);
        let target = scope.schema.column(rollup.target);
        Ok(Fragment::raw(format!(
            "SELECT {}({}) FROM {} WHERE {} = {}",
            rollup.function,
            scope.dialect.ident(&target.name),
            scope.dialect.ident(&related.name),
            scope.dialect.ident(&child.name),
            scope.dialect.qualified(alias, &parent.name),
        )))
    }
}

pub struct TestEngine {
    pub engine: Engine,
    pub driver: Arc<RecordingDriver>,
    pub cache: Arc<MemoryCache>,
}

pub fn pg_engine() -> TestEngine {
    engine_for(EngineFamily::Postgres)
}

pub fn mysql_engine() -> TestEngine {
    engine_for(EngineFamily::Mysql)
}

fn engine_for(family: EngineFamily) -> TestEngine {
    let driver = RecordingDriver::new(family);
    let cache = MemoryCache::new();
    let builder = Engine::builder()
        .schema(fixture_schema())
        .driver(driver.clone())
        .cache(cache.clone())
        .hooks(Arc::new(TestHooks));
    let builder = match family {
        EngineFamily::Postgres => builder.dialect(Postgres),
        _ => builder.dialect(Mysql),
    };
    TestEngine {
        engine: builder.build().unwrap(),
        driver,
        cache,
    }
}
