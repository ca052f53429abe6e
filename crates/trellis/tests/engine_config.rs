mod support;

use std::sync::Arc;
use support::*;
use trellis::{Engine, EngineFamily, Mysql};

#[tokio::test]
async fn explicit_dialect_must_match_the_driver() {
    let err = Engine::builder()
        .schema(fixture_schema())
        .dialect(Mysql)
        .driver(RecordingDriver::new(EngineFamily::Postgres))
        .hooks(Arc::new(TestHooks))
        .build()
        .unwrap_err();
    assert!(err.is_dialect_mismatch(), "got: {err}");
}

#[tokio::test]
async fn dialect_is_derived_from_the_driver_family() {
    let driver = RecordingDriver::new(EngineFamily::Mysql);
    let engine = Engine::builder()
        .schema(fixture_schema())
        .driver(driver.clone())
        .hooks(Arc::new(TestHooks))
        .build()
        .unwrap();

    engine.list(trellis::ListRequest::new(CITY)).await.unwrap();
    assert!(driver.calls()[0].0.contains("`cities`"));
}

#[tokio::test]
async fn unsupported_family_needs_an_explicit_dialect() {
    let err = Engine::builder()
        .schema(fixture_schema())
        .driver(RecordingDriver::new(EngineFamily::Sqlite))
        .build()
        .unwrap_err();
    assert!(err.is_dialect_mismatch());
}

#[tokio::test]
async fn unknown_table_ids_error_instead_of_panicking() {
    let t = pg_engine();

    let err = t
        .engine
        .list(trellis::ListRequest::new(99usize))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown table"), "got: {err}");
    assert_eq!(t.driver.call_count(), 0);
}

#[tokio::test]
async fn default_hooks_reject_filter_clauses() {
    let t = pg_engine();
    let engine = Engine::builder()
        .schema(fixture_schema())
        .driver(t.driver.clone())
        .build()
        .unwrap();

    let args = trellis::ListArgs {
        where_clause: Some("Title=Malta".into()),
        ..Default::default()
    };
    let err = engine
        .list(trellis::ListRequest::new(COUNTRY).args(args).strict())
        .await
        .unwrap_err();
    assert!(err.is_invalid_filter(), "got: {err}");
}
