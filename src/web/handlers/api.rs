use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::chat::{ChatError, ChatResponse};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub llm_backend: String,
    pub llm_model: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ChatError::EmptyQuestion => (StatusCode::BAD_REQUEST, self.to_string()),
            ChatError::Generation(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error generating SQL: {}", e),
            ),
            ChatError::Schema(_) | ChatError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        service: state.config.service_name.clone(),
    })
}

// Natural language question -> generated SQL + rows
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    let response = state
        .chat
        .answer(&payload.query)
        .await
        .inspect_err(|e| error!("Chat request failed: {}", e))?;

    info!(
        "Chat request finished: {} rows, {}",
        response.data.len(),
        response.message
    );
    Ok(Json(response))
}

// System status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        llm_backend: state.chat.llm().backend().to_string(),
        llm_model: state.chat.llm().model().to_string(),
    })
}
