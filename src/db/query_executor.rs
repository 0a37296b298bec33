use crate::db::query_guard::QueryGuard;
use crate::db::values::{Record, SqlValue};
use crate::db::{DbError, DbPool};
use duckdb::types::Value;
use duckdb::Connection;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs generated SQL verbatim and materializes every row.
#[derive(Clone)]
pub struct QueryExecutor {
    pool: DbPool,
    guard: QueryGuard,
}

impl QueryExecutor {
    pub fn new(pool: DbPool, guard: QueryGuard) -> Self {
        Self { pool, guard }
    }

    /// Fails only with `DbError::Execution`, except for a crashed blocking task
    /// which is reported as `DbError::Task`.
    pub async fn execute(&self, sql: &str) -> Result<Vec<Record>, DbError> {
        if let Err(reason) = self.guard.check(sql) {
            warn!("Rejected generated SQL: {}", reason);
            return Err(DbError::Execution(reason));
        }
        // The driver cannot hand an interior NUL to the C API
        if sql.contains('\0') {
            warn!("Rejected generated SQL containing a NUL byte");
            return Err(DbError::Execution(
                "statement contains a NUL byte".to_string(),
            ));
        }

        let pool = self.pool.clone();
        let sql = sql.to_string();
        let start_time = Instant::now();

        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<Record>, DbError> {
            let conn = pool
                .get()
                .map_err(|e| DbError::Execution(format!("could not acquire connection: {}", e)))?;
            fetch_records(&conn, &sql).map_err(|e| DbError::Execution(e.to_string()))
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))??;

        info!(
            "Query executed successfully. Row count: {}, Execution time: {}ms",
            rows.len(),
            start_time.elapsed().as_millis()
        );
        Ok(rows)
    }
}

fn fetch_records(conn: &Connection, sql: &str) -> Result<Vec<Record>, duckdb::Error> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;

    let columns = rows
        .as_ref()
        .map(|stmt| stmt.column_names())
        .unwrap_or_default();
    debug!("Result columns: {:?}", columns);

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (i, column) in columns.iter().enumerate() {
            let value: Value = row.get(i)?;
            record.push(column.clone(), SqlValue::from(value));
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::build_pool;

    fn seeded_pool() -> DbPool {
        let pool = build_pool(&DatabaseConfig {
            connection_string: ":memory:".to_string(),
            schema: "main".to_string(),
            pool_size: 2,
        })
        .unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "CREATE TABLE invoices (
                    id INTEGER,
                    vendor VARCHAR,
                    total DECIMAL(10,2),
                    paid BOOLEAN,
                    issued DATE
                 );
                 INSERT INTO invoices VALUES
                    (1, 'Acme', 120.50, true, DATE '2024-03-01'),
                    (2, 'Globex', 80.00, false, NULL);",
            )
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn maps_rows_to_typed_records() {
        let executor = QueryExecutor::new(seeded_pool(), QueryGuard::default());

        let rows = executor
            .execute("SELECT id, vendor, total, paid, issued FROM invoices ORDER BY id")
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(
            first.columns().collect::<Vec<_>>(),
            vec!["id", "vendor", "total", "paid", "issued"]
        );
        assert_eq!(first.get("id"), Some(&SqlValue::Integer(1)));
        assert_eq!(first.get("vendor"), Some(&SqlValue::Text("Acme".to_string())));
        assert_eq!(first.get("total"), Some(&SqlValue::Float(120.5)));
        assert_eq!(first.get("paid"), Some(&SqlValue::Bool(true)));
        assert_eq!(
            serde_json::to_value(first.get("issued").unwrap()).unwrap(),
            "2024-03-01"
        );
        assert_eq!(rows[1].get("issued"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn aliases_become_record_keys() {
        let executor = QueryExecutor::new(seeded_pool(), QueryGuard::default());

        let rows = executor
            .execute("SELECT COUNT(*) AS count FROM invoices;")
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            serde_json::json!([{ "count": 2 }])
        );
    }

    #[tokio::test]
    async fn empty_result_has_no_records() {
        let executor = QueryExecutor::new(seeded_pool(), QueryGuard::default());
        let rows = executor
            .execute("SELECT * FROM invoices WHERE id > 100")
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn missing_table_is_an_execution_error() {
        let executor = QueryExecutor::new(seeded_pool(), QueryGuard::default());
        let err = executor.execute("SELECT * FROM payments").await.unwrap_err();
        match err {
            DbError::Execution(message) => assert!(message.contains("payments")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn syntax_errors_are_execution_errors() {
        let executor = QueryExecutor::new(seeded_pool(), QueryGuard::default());
        assert!(matches!(
            executor.execute("SELEC id FROM invoices").await,
            Err(DbError::Execution(_))
        ));
    }

    #[tokio::test]
    async fn mutations_run_unless_read_only() {
        let pool = seeded_pool();

        let permissive = QueryExecutor::new(pool.clone(), QueryGuard::default());
        permissive
            .execute("DELETE FROM invoices WHERE id = 2")
            .await
            .unwrap();

        let read_only = QueryExecutor::new(pool.clone(), QueryGuard::new(true));
        let err = read_only.execute("DELETE FROM invoices").await.unwrap_err();
        assert!(matches!(err, DbError::Execution(_)));

        let rows = read_only
            .execute("SELECT COUNT(*) AS n FROM invoices")
            .await
            .unwrap();
        assert_eq!(rows[0].get("n"), Some(&SqlValue::Integer(1)));
    }

    #[tokio::test]
    async fn nul_byte_is_an_execution_error() {
        let executor = QueryExecutor::new(seeded_pool(), QueryGuard::default());
        match executor.execute("SELECT 1;\0").await {
            Err(DbError::Execution(message)) => assert!(message.contains("NUL")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn multiple_statements_are_refused() {
        let pool = seeded_pool();
        let executor = QueryExecutor::new(pool.clone(), QueryGuard::default());

        match executor.execute("SELECT 1; DROP TABLE invoices;").await {
            Err(DbError::Execution(message)) => {
                assert!(message.to_lowercase().contains("multiple statements"))
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let rows = executor
            .execute("SELECT COUNT(*) AS n FROM invoices")
            .await
            .unwrap();
        assert_eq!(rows[0].get("n"), Some(&SqlValue::Integer(2)));
    }

    #[tokio::test]
    async fn read_only_cannot_be_bypassed_with_a_trailing_statement() {
        let pool = seeded_pool();
        let read_only = QueryExecutor::new(pool.clone(), QueryGuard::new(true));

        assert!(matches!(
            read_only.execute("SELECT 1; DROP TABLE invoices;").await,
            Err(DbError::Execution(_))
        ));
        assert!(matches!(
            read_only
                .execute("WITH x AS (SELECT 1) SELECT * FROM x; DELETE FROM invoices")
                .await,
            Err(DbError::Execution(_))
        ));

        let rows = read_only
            .execute("SELECT COUNT(*) AS n FROM invoices")
            .await
            .unwrap();
        assert_eq!(rows[0].get("n"), Some(&SqlValue::Integer(2)));
    }
}
