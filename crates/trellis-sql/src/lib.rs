mod alias;
pub use alias::{AliasGenerator, ROOT_ALIAS};

pub mod dialect;
pub use dialect::{Dialect, Mysql, Postgres};

mod fragment;
pub use fragment::{Bind, Fragment};

mod query;
pub use query::{CompiledQuery, SelectQuery};

pub mod template;
