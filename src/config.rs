use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    /// Catalog schema the inspector describes
    pub schema: String,
    pub pool_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Reject statements that do not start with a read keyword
    pub read_only: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// DuckDB database path (overrides DATABASE_URL)
    #[arg(long)]
    pub database: Option<String>,
}

const SUPPORTED_BACKENDS: [&str; 2] = ["remote", "ollama"];

impl AppConfig {
    /// Loads defaults, then the config file, then the environment, then CLI flags.
    pub fn new(args: &CliArgs) -> Result<Self, ConfigurationError> {
        let defaults = AppConfig::default();
        let mut config_builder = Config::builder()
            .set_default("service_name", defaults.service_name)?
            .set_default("database.connection_string", defaults.database.connection_string)?
            .set_default("database.schema", defaults.database.schema)?
            .set_default("database.pool_size", i64::from(defaults.database.pool_size))?
            .set_default("web.host", defaults.web.host)?
            .set_default("web.port", i64::from(defaults.web.port))?
            .set_default("llm.backend", defaults.llm.backend)?
            .set_default("llm.model", defaults.llm.model)?
            .set_default("llm.temperature", f64::from(defaults.llm.temperature))?
            .set_default("llm.max_tokens", i64::from(defaults.llm.max_tokens))?
            .set_default("llm.timeout_secs", defaults.llm.timeout_secs as i64)?
            .set_default("query.read_only", defaults.query.read_only)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/chat-sql/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("CHAT_SQL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Conventional deployment variables
        config_builder = config_builder
            .set_override_option("database.connection_string", std::env::var("DATABASE_URL").ok())?
            .set_override_option("llm.api_key", std::env::var("GROQ_API_KEY").ok())?;
        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigurationError::Invalid {
                key: "PORT",
                reason: format!("'{}' is not a valid port", port),
            })?;
            config_builder = config_builder.set_override("web.port", i64::from(port))?;
        }

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.connection_string = database.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the settings the service cannot start without.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.database.connection_string.trim().is_empty() {
            return Err(ConfigurationError::Missing("database.connection_string"));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigurationError::Invalid {
                key: "database.pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if !SUPPORTED_BACKENDS.contains(&self.llm.backend.as_str()) {
            return Err(ConfigurationError::Invalid {
                key: "llm.backend",
                reason: format!(
                    "unsupported backend '{}', expected one of {:?}",
                    self.llm.backend, SUPPORTED_BACKENDS
                ),
            });
        }
        let has_key = self
            .llm
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if self.llm.backend == "remote" && !has_key {
            return Err(ConfigurationError::Missing("llm.api_key"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigurationError::Invalid {
                key: "llm.temperature",
                reason: format!("{} is outside 0.0..=2.0", self.llm.temperature),
            });
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigurationError::Invalid {
                key: "llm.max_tokens",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "chat-sql".to_string(),
            database: DatabaseConfig {
                connection_string: "chat-sql.duckdb".to_string(),
                schema: "main".to_string(),
                pool_size: 4,
            },
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "llama3-8b-8192".to_string(),
                api_key: None,
                api_url: None,
                temperature: 0.1,
                max_tokens: 1000,
                timeout_secs: 60,
            },
            query: QueryConfig { read_only: false },
        }
    }
}
