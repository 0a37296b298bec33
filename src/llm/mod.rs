pub mod models;
pub mod prompt;
pub mod providers;
pub mod sql_extract;

use crate::config::LlmConfig;
use crate::db::DIALECT;
use crate::llm::models::CompletionRequest;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A language model that turns a system/user prompt pair into free text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Composes the prompt, calls the configured provider and extracts the SQL.
pub struct LlmManager {
    provider: Box<dyn CompletionProvider>,
    backend: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider: Box<dyn CompletionProvider> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self::with_provider(provider, config))
    }

    /// Uses `provider` with the sampling settings from `config`.
    pub fn with_provider(provider: Box<dyn CompletionProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            backend: config.backend.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_sql(&self, question: &str, schema_text: &str) -> Result<String, LlmError> {
        let prompt = prompt::compose_prompt(question, schema_text, DIALECT);
        debug!("Prepared LLM prompt: {}", prompt.user);

        let request = CompletionRequest {
            system_prompt: prompt.system,
            user_prompt: prompt.user,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!("Requesting SQL from {} model {}", self.backend, self.model);
        let raw = self.provider.complete(&request).await?;
        debug!("Raw model response: {}", raw);

        Ok(sql_extract::extract_sql(&raw))
    }
}
