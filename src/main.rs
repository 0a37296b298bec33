use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use chat_sql::config::{AppConfig, CliArgs};
use chat_sql::db::build_pool;
use chat_sql::llm::LlmManager;
use chat_sql::util::logging::init_tracing;
use chat_sql::web;
use chat_sql::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration; a missing credential or connection string is fatal
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    info!("Opening DuckDB connection pool");
    let pool = build_pool(&config.database).inspect_err(|e| error!("{}", e))?;

    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;

    let web_config = config.web.clone();
    let app_state = Arc::new(AppState::new(config, pool, llm_manager));

    info!(
        "Starting {} on {}:{}",
        app_state.config.service_name, web_config.host, web_config.port
    );
    match web::run_server(web_config, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
