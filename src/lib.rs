pub mod collection;
pub mod config;
pub mod errors;
pub mod index;
pub mod logger;
pub mod query;
pub mod utils;
pub mod value;

pub use crate::collection::{Collection, Record, RecordId};
pub use crate::config::{AppConfig, LogConfig, QueryConfig};
pub use crate::errors::{CompileError, DbError};
pub use crate::query::{
    CompiledQuery, Cursor, Explain, FindOptions, IndexDirection, IndexSpec, compile, matches, plan,
};

/// Compile `query` with default limits and test it against `doc`.
///
/// # Errors
/// Returns the compile error when `query` is not a valid query.
pub fn matches_query(doc: &bson::Document, query: &bson::Document) -> Result<bool, CompileError> {
    let q = compile(query, &QueryConfig::default())?;
    Ok(matches(doc, &q))
}
