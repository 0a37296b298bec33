use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::db::query_guard::QueryGuard;
use crate::db::{DbPool, QueryExecutor, SchemaInspector};
use crate::llm::LlmManager;
use std::sync::Arc;

/// Shared application state for the web server. Immutable after startup;
/// requests share no mutable state.
pub struct AppState {
    pub config: AppConfig,
    pub chat: ChatService,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: DbPool, llm_manager: LlmManager) -> Self {
        let inspector = SchemaInspector::new(db_pool.clone(), config.database.schema.clone());
        let executor = QueryExecutor::new(db_pool, QueryGuard::new(config.query.read_only));
        let chat = ChatService::new(inspector, Arc::new(llm_manager), executor);

        Self {
            config,
            chat,
            startup_time: chrono::Utc::now(),
        }
    }
}
