mod support;

use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use support::*;
use trellis::{Engine, EngineFamily, ListArgs, ListRequest, Postgres, Selection, Value};
use trellis_core::schema::{
    Cardinality, Column, ColumnId, ColumnKind, Link, Lookup, Schema, Table, TableId,
};

fn sel(json: serde_json::Value) -> Selection {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn lookup_through_belongs_to_stays_scalar() {
    let t = pg_engine();
    let req = ListRequest::new(CITY).selection(sel(serde_json::json!({"CountryName": true})));
    t.engine.list(req).await.unwrap();

    let sql = t.driver.last_sql();
    assert!(sql.contains(r#"."Title" AS "CountryName""#));
    assert!(!sql.contains("json_agg("), "single-valued lookup never aggregates: {sql}");
}

#[tokio::test]
async fn lookup_through_has_many_aggregates() {
    let t = pg_engine();
    let req = ListRequest::new(COUNTRY).selection(sel(serde_json::json!({"CityNames": true})));
    t.engine.list(req).await.unwrap();

    let sql = t.driver.last_sql();
    assert!(sql.contains("coalesce(json_agg("));
    assert!(sql.contains(r#"AS "CityNames""#));
}

#[tokio::test]
async fn array_valued_lookup_targets_are_flattened() {
    let t = pg_engine();
    let req = ListRequest::new(COUNTRY).selection(sel(serde_json::json!({"CityTags": true})));
    t.engine.list(req).await.unwrap();

    let sql = t.driver.last_sql();
    assert!(sql.contains("json_array_elements("), "flattened via unnest: {sql}");
    assert!(sql.contains(r#"AS "CityTags""#));
}

#[tokio::test]
async fn mysql_flattens_with_json_table() {
    let t = mysql_engine();
    let req = ListRequest::new(COUNTRY).selection(sel(serde_json::json!({"CityTags": true})));
    t.engine.list(req).await.unwrap();

    let calls = t.driver.calls();
    assert!(calls[0].0.contains("JSON_TABLE("));
}

#[tokio::test]
async fn many_to_many_routes_through_the_associative_table() {
    let t = pg_engine();
    let req = ListRequest::new(CITY).selection(sel(serde_json::json!({"Tags": true})));
    t.engine.list(req).await.unwrap();

    let sql = t.driver.last_sql();
    assert!(sql.contains(r#""city_tags""#));
    assert!(sql.contains(r#"LEFT JOIN "tags""#));
    assert!(sql.contains("coalesce(json_agg(jsonb_build_object("));
}

#[tokio::test]
async fn nested_arguments_page_the_relation_and_skip_the_cache() {
    let t = pg_engine();
    let mut nested = HashMap::new();
    nested.insert(
        "CityList".to_string(),
        ListArgs {
            limit: Some(3),
            where_clause: Some("Title=Osaka".into()),
            ..Default::default()
        },
    );
    let args = ListArgs {
        nested,
        ..Default::default()
    };
    let req = ListRequest::new(COUNTRY)
        .selection(sel(serde_json::json!({"CityList": true})))
        .args(args);
    t.engine.list(req).await.unwrap();

    assert_eq!(t.cache.set_count(), 0, "nested arguments are ad-hoc shape");
    let (_, binds) = t.driver.calls().remove(0);
    assert!(binds.contains(&Value::I64(3)));
    assert!(binds.contains(&Value::String("Osaka".into())));
}

#[tokio::test]
async fn default_nested_page_size_applies_to_has_many() {
    let t = pg_engine();
    let req = ListRequest::new(COUNTRY).selection(sel(serde_json::json!({"CityList": true})));
    t.engine.list(req).await.unwrap();

    // The relation page size is part of the statement shape, so it lands in
    // the template as a literal.
    let template = t.cache.entry("trellis:qt:0:default:list").unwrap();
    assert!(template.contains("LIMIT 25"), "nested page inlined: {template}");
}

#[tokio::test]
async fn cyclic_lookup_chains_hit_the_depth_limit() {
    let schema = cyclic_schema();
    let driver = RecordingDriver::new(EngineFamily::Postgres);
    let engine = Engine::builder()
        .schema(schema)
        .dialect(Postgres)
        .driver(driver.clone())
        .cache(MemoryCache::new())
        .hooks(Arc::new(TestHooks))
        .build()
        .unwrap();

    let err = engine
        .list(ListRequest::new(0usize).selection(Selection::fields(["Loop"])))
        .await
        .unwrap_err();
    assert!(err.is_nesting_depth(), "got: {err}");
    assert_eq!(driver.call_count(), 0, "fails at compile time");
}

/// Two tables whose lookups point at each other, forming an unbounded
/// chain.
fn cyclic_schema() -> Schema {
    fn scalar(table: usize, index: usize, title: &str, name: &str) -> Column {
        Column {
            id: ColumnId {
                table: TableId(table),
                index,
            },
            name: name.to_string(),
            title: title.to_string(),
            kind: ColumnKind::Scalar,
            auto_increment: true,
            system: false,
        }
    }
    fn virt(table: usize, index: usize, title: &str, kind: ColumnKind) -> Column {
        Column {
            id: ColumnId {
                table: TableId(table),
                index,
            },
            name: String::new(),
            title: title.to_string(),
            kind,
            auto_increment: false,
            system: false,
        }
    }
    let id = |table: usize, index: usize| ColumnId {
        table: TableId(table),
        index,
    };

    let make = |this: usize, other: usize, name: &str| Table {
        id: TableId(this),
        name: name.to_string(),
        title: name.to_uppercase(),
        columns: vec![
            scalar(this, 0, "Id", "id"),
            Column {
                auto_increment: false,
                ..scalar(this, 1, "OtherId", "other_id")
            },
            virt(
                this,
                2,
                "Other",
                ColumnKind::Link(Link {
                    cardinality: Cardinality::BelongsTo,
                    target: TableId(other),
                    parent_column: id(other, 0),
                    child_column: id(this, 1),
                    through: None,
                }),
            ),
            virt(
                this,
                3,
                "Loop",
                ColumnKind::Lookup(Lookup {
                    link: id(this, 2),
                    target: id(other, 3),
                }),
            ),
        ],
        primary_key: vec![0],
        display_column: Some(0),
    };

    Schema::from_tables(vec![make(0, 1, "alpha"), make(1, 0, "beta")]).unwrap()
}
