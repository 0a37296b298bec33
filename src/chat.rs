use crate::db::{DbError, QueryExecutor, Record, SchemaInspector};
use crate::llm::{LlmError, LlmManager};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

pub const SUCCESS_MESSAGE: &str = "Query executed successfully";

/// Result of a question whose SQL was generated, whether or not it ran.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub sql: String,
    pub data: Vec<Record>,
    pub message: String,
    #[serde(skip)]
    pub execution_error: Option<String>,
}

impl ChatResponse {
    pub fn completed(sql: String, data: Vec<Record>) -> Self {
        Self {
            sql,
            data,
            message: SUCCESS_MESSAGE.to_string(),
            execution_error: None,
        }
    }

    pub fn execution_failed(sql: String, error: String) -> Self {
        Self {
            sql,
            data: Vec::new(),
            message: format!("SQL generated but execution failed: {}", error),
            execution_error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.execution_error.is_none()
    }
}

/// Failures that leave no SQL to return.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Query is required")]
    EmptyQuestion,
    #[error(transparent)]
    Schema(DbError),
    #[error(transparent)]
    Generation(#[from] LlmError),
    #[error("{0}")]
    Internal(String),
}

/// Question in, SQL and rows out: inspect, generate, execute.
#[derive(Clone)]
pub struct ChatService {
    inspector: SchemaInspector,
    llm: Arc<LlmManager>,
    executor: QueryExecutor,
}

impl ChatService {
    pub fn new(inspector: SchemaInspector, llm: Arc<LlmManager>, executor: QueryExecutor) -> Self {
        Self {
            inspector,
            llm,
            executor,
        }
    }

    pub fn llm(&self) -> &LlmManager {
        &self.llm
    }

    pub async fn answer(&self, question: &str) -> Result<ChatResponse, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        info!("Chat question: {}", question);

        let sql = self.generate(question).await?;
        info!("Generated SQL: {}", sql);

        match self.executor.execute(&sql).await {
            Ok(data) => Ok(ChatResponse::completed(sql, data)),
            Err(DbError::Task(e)) => {
                error!("Execution task failed: {}", e);
                Err(ChatError::Internal(format!("Database task failed: {}", e)))
            }
            Err(e) => {
                warn!("Generated SQL failed to execute: {}", e);
                Ok(ChatResponse::execution_failed(sql, e.to_string()))
            }
        }
    }

    async fn generate(&self, question: &str) -> Result<String, ChatError> {
        let schema = self.inspector.describe_schema().await.map_err(|e| {
            error!("Schema introspection failed: {}", e);
            match e {
                DbError::Task(msg) => ChatError::Internal(msg),
                other => ChatError::Schema(other),
            }
        })?;

        let sql = self
            .llm
            .generate_sql(question, &schema.to_string())
            .await
            .inspect_err(|e| error!("SQL generation failed: {}", e))?;
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DatabaseConfig};
    use crate::db::query_guard::QueryGuard;
    use crate::db::{build_pool, DbPool, SqlValue};
    use crate::llm::models::CompletionRequest;
    use crate::llm::CompletionProvider;
    use async_trait::async_trait;

    struct Scripted(Result<String, String>);

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            self.0.clone().map_err(LlmError::ConnectionError)
        }
    }

    fn orders_pool() -> DbPool {
        let pool = build_pool(&DatabaseConfig {
            connection_string: ":memory:".to_string(),
            schema: "main".to_string(),
            pool_size: 2,
        })
        .unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "CREATE TABLE orders (id INTEGER, total DECIMAL(10,2));
                 INSERT INTO orders VALUES (1, 10.00), (2, 25.50), (3, 7.25);",
            )
            .unwrap();
        pool
    }

    fn service(pool: DbPool, reply: Result<&str, &str>) -> ChatService {
        let provider = Scripted(reply.map(str::to_string).map_err(str::to_string));
        let llm = LlmManager::with_provider(Box::new(provider), &AppConfig::default().llm);
        ChatService::new(
            SchemaInspector::new(pool.clone(), "main"),
            Arc::new(llm),
            QueryExecutor::new(pool, QueryGuard::default()),
        )
    }

    #[tokio::test]
    async fn completed_question_returns_rows() {
        let chat = service(
            orders_pool(),
            Ok("```sql\nSELECT COUNT(*) AS count FROM orders;\n```"),
        );

        let response = chat.answer("how many orders are there").await.unwrap();

        assert!(response.is_success());
        assert_eq!(response.sql, "SELECT COUNT(*) AS count FROM orders;");
        assert_eq!(response.message, SUCCESS_MESSAGE);
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].get("count"), Some(&SqlValue::Integer(3)));
    }

    #[tokio::test]
    async fn execution_failure_is_soft() {
        let chat = service(orders_pool(), Ok("SELECT * FROM invoices"));

        let response = chat.answer("list invoices").await.unwrap();

        assert_eq!(response.sql, "SELECT * FROM invoices");
        assert!(response.data.is_empty());
        assert!(response.message.starts_with("SQL generated but execution failed:"));
        assert!(response.execution_error.is_some());
    }

    #[tokio::test]
    async fn nul_byte_in_generated_sql_is_soft() {
        let chat = service(orders_pool(), Ok("SELECT 1;\0"));

        let response = chat.answer("anything").await.unwrap();

        assert_eq!(response.sql, "SELECT 1;\0");
        assert!(response.data.is_empty());
        assert!(!response.is_success());
        assert!(response.message.starts_with("SQL generated but execution failed:"));
    }

    #[tokio::test]
    async fn generation_failure_is_hard() {
        let chat = service(orders_pool(), Err("connection refused"));
        let err = chat.answer("how many orders are there").await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(LlmError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_generation() {
        let chat = service(orders_pool(), Ok("SELECT 1"));
        assert!(matches!(chat.answer("   ").await, Err(ChatError::EmptyQuestion)));
    }

    #[test]
    fn serialized_response_omits_execution_error() {
        let response = ChatResponse::execution_failed("SELECT x".to_string(), "boom".to_string());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sql": "SELECT x",
                "data": [],
                "message": "SQL generated but execution failed: boom"
            })
        );
    }
}
