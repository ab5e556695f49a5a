use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Record store configuration
    pub state: StateConfig,

    /// Listing cache configuration
    pub cache: CacheConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment.
    ///
    /// The file path is taken from `path` when given, otherwise from `CONFIG_PATH`,
    /// otherwise `config/local.toml` (optional).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_string_lossy().into_owned(),
            None => std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string()),
        };

        let settings = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(path.is_some()))
            // Override with environment variables (prefix: INCIDENTS_)
            .add_source(
                config::Environment::with_prefix("INCIDENTS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Record store backend
    #[serde(default)]
    pub backend: StateBackend,

    /// Path for the embedded database
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Listing cache backend
    #[serde(default)]
    pub backend: CacheBackend,

    /// Full Redis connection string, takes precedence over host/port/db
    pub redis_url: Option<String>,

    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    #[serde(default)]
    pub redis_db: u32,

    /// Lifetime of a cached listing (seconds)
    #[serde(default = "default_listing_ttl")]
    pub listing_ttl_secs: u64,

    /// Entry bound for the in-process backend
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl CacheConfig {
    /// Connection string for the Redis backend
    pub fn redis_url(&self) -> String {
        match &self.redis_url {
            Some(url) => url.clone(),
            None => format!(
                "redis://{}:{}/{}",
                self.redis_host, self.redis_port, self.redis_db
            ),
        }
    }

    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_listing_ttl() -> u64 {
    3600 // 1 hour
}

fn default_max_capacity() -> u64 {
    10000
}

fn default_log_level() -> String {
    "info".to_string()
}
