use crate::config::DatabaseConfig;
use crate::db::DbError;
use duckdb::Connection;
use r2d2::{ManageConnection, Pool};
use std::sync::Mutex;
use tracing::info;

pub type DbPool = Pool<DuckDBConnectionManager>;

/// Hands out connections that all share one opened DuckDB instance, so every
/// pooled connection (including `:memory:` databases) sees the same data.
pub struct DuckDBConnectionManager {
    connection_string: String,
    root: Mutex<Connection>,
}

impl DuckDBConnectionManager {
    pub fn open(connection_string: &str) -> Result<Self, DbError> {
        let path = normalize_connection_string(connection_string);
        let root = Connection::open(path)
            .map_err(|e| DbError::Unavailable(format!("cannot open '{}': {}", path, e)))?;

        Ok(Self {
            connection_string: path.to_string(),
            root: Mutex::new(root),
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = DbError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let root = self
            .root
            .lock()
            .map_err(|_| DbError::Unavailable("root connection lock poisoned".to_string()))?;
        root.try_clone()
            .map_err(|e| DbError::Unavailable(e.to_string()))
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])
            .map_err(|e| DbError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Strips an optional `duckdb://` scheme so URL-style settings work as paths.
pub fn normalize_connection_string(connection_string: &str) -> &str {
    let trimmed = connection_string.trim();
    trimmed.strip_prefix("duckdb://").unwrap_or(trimmed)
}

pub fn build_pool(config: &DatabaseConfig) -> Result<DbPool, DbError> {
    let manager = DuckDBConnectionManager::open(&config.connection_string)?;
    info!(
        "Opened DuckDB database at {} (pool size {})",
        manager.connection_string(),
        config.pool_size
    );

    let pool = Pool::builder().max_size(config.pool_size).build(manager)?;
    Ok(pool)
}
