pub mod db_pool;
pub mod query_executor;
pub mod query_guard;
pub mod schema_inspector;
pub mod values;

use thiserror::Error;

pub use db_pool::{build_pool, DbPool};
pub use query_executor::QueryExecutor;
pub use schema_inspector::{SchemaDescription, SchemaInspector};
pub use values::{Record, SqlValue};

/// SQL dialect named in prompts; matches the embedded engine.
pub const DIALECT: &str = "DuckDB";

#[derive(Debug, Error)]
pub enum DbError {
    /// No connection could be opened or checked out.
    #[error("Database unavailable: {0}")]
    Unavailable(String),
    /// A catalog query failed while describing the schema.
    #[error("Schema query failed: {0}")]
    SchemaQuery(String),
    /// The generated statement failed to run.
    #[error("{0}")]
    Execution(String),
    /// The blocking database task panicked or was cancelled.
    #[error("Database task failed: {0}")]
    Task(String),
}

impl From<r2d2::Error> for DbError {
    fn from(e: r2d2::Error) -> Self {
        DbError::Unavailable(e.to_string())
    }
}
