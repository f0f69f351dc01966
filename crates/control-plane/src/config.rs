//! Environment-only configuration (spec §6, §10.3), loaded once at startup.
//! A missing or malformed required variable is a startup failure (exit code
//! 1), following `cli/src/env.rs`'s convention of reading the whole process
//! environment up front rather than threading `env::var` calls through the
//! rest of the program.

use catalog::CatalogConfig;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// `LOG_FORMAT`: pretty for local development, json for shipping to the
/// fixed logging transport named out of scope in §1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub http_bind_addr: SocketAddr,
    pub worker_task_queue: String,
    pub runtime_namespace: String,
    pub batch_size: u64,
    pub idle_timeout_seconds: u64,
    pub snapshot_parallelism: usize,
    pub max_concurrent_activities: usize,
    pub jwt_secret: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let catalog = CatalogConfig {
            host: required("CATALOG_HOST")?,
            port: parse_or("CATALOG_PORT", 5432)?,
            user: required("CATALOG_USER")?,
            password: env::var("CATALOG_PASSWORD").unwrap_or_default(),
            database: required("CATALOG_DATABASE")?,
        };

        let http_bind_addr = env::var("HTTP_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8085".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "HTTP_BIND_ADDR",
                value: env::var("HTTP_BIND_ADDR").unwrap_or_default(),
            })?;

        let log_format = match env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()).as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            catalog,
            http_bind_addr,
            worker_task_queue: env::var("WORKER_TASK_QUEUE").unwrap_or_else(|_| "bunny-mirrors".to_string()),
            runtime_namespace: env::var("RUNTIME_NAMESPACE").unwrap_or_else(|_| "default".to_string()),
            batch_size: parse_or("BATCH_SIZE", 1000)?,
            idle_timeout_seconds: parse_or("IDLE_TIMEOUT_SECONDS", 60)?,
            snapshot_parallelism: parse_or("SNAPSHOT_PARALLELISM", 4)?,
            max_concurrent_activities: parse_or("MAX_CONCURRENT_ACTIVITIES", 10)?,
            jwt_secret: env::var("JWT_SECRET").ok(),
            log_format,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
