use crate::{Result, Row, Value};
use async_trait::async_trait;
use std::fmt;

/// Database engine families the compiler can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFamily {
    Postgres,
    Mysql,
    /// Present so construction can fail fast against an unsupported driver.
    Sqlite,
}

impl fmt::Display for EngineFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineFamily::Postgres => "postgres",
            EngineFamily::Mysql => "mysql",
            EngineFamily::Sqlite => "sqlite",
        })
    }
}

/// Executes finished statements. Connection pooling, transactions, and the
/// wire protocol all live behind this trait.
#[async_trait]
pub trait Driver: Send + Sync + fmt::Debug {
    fn family(&self) -> EngineFamily;

    /// Runs `sql` with positional `binds` and returns the result rows.
    async fn execute(&self, sql: &str, binds: &[Value]) -> Result<Vec<Row>>;
}

/// Stores compiled statement templates keyed by
/// `scope:tableId:viewId:operation`. Implementations are typically backed
/// by a shared cache; tests use an in-memory map.
#[async_trait]
pub trait QueryCache: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a template. Writes are idempotent; concurrent compilers may
    /// race to store the same text.
    async fn set(&self, key: &str, template: &str) -> Result<()>;

    /// Drops every entry whose key starts with `prefix`. Schema-mutating
    /// collaborators call this after altering a table.
    async fn evict_prefix(&self, prefix: &str) -> Result<()>;
}
