use crate::db::{DbError, DbPool};
use duckdb::{params, Connection};
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    /// Physical column order
    pub columns: Vec<ColumnDescriptor>,
}

/// Tables of one catalog schema, sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDescription {
    pub tables: Vec<TableDescriptor>,
}

impl SchemaDescription {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Renders the compact text block handed to the prompt composer:
///
/// ```text
/// orders:
///   - id (INTEGER)
///   - total (DECIMAL(10,2))
///
/// vendors:
///   - name (VARCHAR)
/// ```
impl fmt::Display for SchemaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, table) in self.tables.iter().enumerate() {
            if i > 0 {
                write!(f, "\n\n")?;
            }
            write!(f, "{}:", table.name)?;
            for column in &table.columns {
                write!(f, "\n  - {} ({})", column.name, column.data_type)?;
            }
        }
        Ok(())
    }
}

const TABLES_QUERY: &str = "
    SELECT table_name
    FROM information_schema.tables
    WHERE table_catalog = current_database()
      AND table_schema = ?
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
";

const COLUMNS_QUERY: &str = "
    SELECT column_name, data_type, is_nullable, column_default
    FROM information_schema.columns
    WHERE table_catalog = current_database()
      AND table_schema = ?
      AND table_name = ?
    ORDER BY ordinal_position
";

/// Reads the live catalog on every call; nothing is cached.
#[derive(Clone)]
pub struct SchemaInspector {
    pool: DbPool,
    schema: String,
}

impl SchemaInspector {
    pub fn new(pool: DbPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub async fn describe_schema(&self) -> Result<SchemaDescription, DbError> {
        let pool = self.pool.clone();
        let schema = self.schema.clone();

        // DuckDB calls block, keep them off the async workers
        let description = tokio::task::spawn_blocking(move || -> Result<SchemaDescription, DbError> {
            let conn = pool.get()?;
            read_catalog(&conn, &schema)
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))??;

        info!(
            "Described schema '{}': {} tables",
            self.schema,
            description.tables.len()
        );
        Ok(description)
    }
}

fn read_catalog(conn: &Connection, schema: &str) -> Result<SchemaDescription, DbError> {
    let query_failed = |e: duckdb::Error| DbError::SchemaQuery(e.to_string());

    let mut tables_stmt = conn.prepare(TABLES_QUERY).map_err(query_failed)?;
    let table_names = tables_stmt
        .query_map(params![schema], |row| row.get::<_, String>(0))
        .map_err(query_failed)?
        .collect::<Result<Vec<String>, _>>()
        .map_err(query_failed)?;

    let mut columns_stmt = conn.prepare(COLUMNS_QUERY).map_err(query_failed)?;
    let mut tables = Vec::with_capacity(table_names.len());

    for table_name in table_names {
        let columns = columns_stmt
            .query_map(params![schema, table_name], |row| {
                Ok(ColumnDescriptor {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    nullable: row.get::<_, String>(2)? == "YES",
                    default: row.get(3)?,
                })
            })
            .map_err(query_failed)?
            .collect::<Result<Vec<ColumnDescriptor>, _>>()
            .map_err(query_failed)?;

        debug!("Table {} has {} columns", table_name, columns.len());
        tables.push(TableDescriptor {
            name: table_name,
            columns,
        });
    }

    Ok(SchemaDescription { tables })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::build_pool;

    fn pool_with(ddl: &str) -> DbPool {
        let pool = build_pool(&DatabaseConfig {
            connection_string: ":memory:".to_string(),
            schema: "main".to_string(),
            pool_size: 2,
        })
        .unwrap();
        pool.get().unwrap().execute_batch(ddl).unwrap();
        pool
    }

    #[tokio::test]
    async fn describes_tables_alphabetically_with_physical_column_order() {
        let pool = pool_with(
            "CREATE TABLE vendors (name VARCHAR NOT NULL, id INTEGER);
             CREATE TABLE orders (id INTEGER, total DECIMAL(10,2) DEFAULT 0, note VARCHAR);
             CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100;",
        );
        let inspector = SchemaInspector::new(pool, "main");

        let description = inspector.describe_schema().await.unwrap();

        let names: Vec<&str> = description.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "vendors"]);

        let orders = &description.tables[0];
        let columns: Vec<&str> = orders.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["id", "total", "note"]);
        assert!(orders.columns[1].default.is_some());
        assert!(orders.columns[0].default.is_none());

        let vendors = &description.tables[1];
        assert!(!vendors.columns[0].nullable);
        assert!(vendors.columns[1].nullable);
    }

    #[tokio::test]
    async fn rendering_is_stable_across_calls() {
        let pool = pool_with(
            "CREATE TABLE b (y VARCHAR);
             CREATE TABLE a (x INTEGER);",
        );
        let inspector = SchemaInspector::new(pool, "main");

        let first = inspector.describe_schema().await.unwrap().to_string();
        let second = inspector.describe_schema().await.unwrap().to_string();

        assert_eq!(first, second);
        assert_eq!(first, "a:\n  - x (INTEGER)\n\nb:\n  - y (VARCHAR)");
    }

    #[tokio::test]
    async fn reflects_schema_changes_between_calls() {
        let pool = pool_with("CREATE TABLE a (x INTEGER);");
        let inspector = SchemaInspector::new(pool.clone(), "main");

        assert_eq!(inspector.describe_schema().await.unwrap().tables.len(), 1);
        pool.get()
            .unwrap()
            .execute_batch("CREATE TABLE c (z BOOLEAN);")
            .unwrap();
        assert_eq!(inspector.describe_schema().await.unwrap().tables.len(), 2);
    }

    #[tokio::test]
    async fn empty_database_renders_empty_text() {
        let pool = pool_with("SELECT 1;");
        let description = SchemaInspector::new(pool, "main")
            .describe_schema()
            .await
            .unwrap();

        assert!(description.is_empty());
        assert_eq!(description.to_string(), "");
    }

    #[tokio::test]
    async fn other_schemas_are_not_described() {
        let pool = pool_with(
            "CREATE SCHEMA staging;
             CREATE TABLE staging.raw (payload VARCHAR);
             CREATE TABLE facts (id INTEGER);",
        );

        let main = SchemaInspector::new(pool.clone(), "main")
            .describe_schema()
            .await
            .unwrap();
        assert_eq!(main.to_string(), "facts:\n  - id (INTEGER)");

        let staging = SchemaInspector::new(pool, "staging")
            .describe_schema()
            .await
            .unwrap();
        assert_eq!(staging.to_string(), "raw:\n  - payload (VARCHAR)");
    }

    #[tokio::test]
    async fn attached_databases_are_not_described() {
        let pool = pool_with(
            "ATTACH ':memory:' AS other;
             CREATE TABLE other.main.extra (x INTEGER);
             CREATE TABLE other.main.facts (y VARCHAR);
             CREATE TABLE facts (id INTEGER);",
        );

        let description = SchemaInspector::new(pool, "main")
            .describe_schema()
            .await
            .unwrap();

        assert_eq!(description.to_string(), "facts:\n  - id (INTEGER)");
    }
}
