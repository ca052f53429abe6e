pub mod args;
pub use args::ListArgs;

mod error;
pub use error::Error;

pub mod filter;
pub use filter::{CompareOp, FilterTree, LogicalOp, SortDirection, SortSpec};

pub mod schema;
pub use schema::Schema;

pub mod select;
pub use select::Selection;

pub mod value;
pub use value::{Row, RowKey, Value};

pub mod driver;
pub use driver::{Driver, EngineFamily, QueryCache};

pub mod view;
pub use view::View;

/// A `Result` alias where the `Err` case is `trellis_core::Error`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub use async_trait::async_trait;
