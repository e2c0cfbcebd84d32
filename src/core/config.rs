//! Configuration management for the collector.
//!
//! Provides layered configuration: defaults, overridden by an optional YAML
//! file, overridden by environment variables, overridden by CLI flags.

use crate::core::{Result, UrpoError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration for the collector process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Ingestion pipeline configuration.
    pub collector: CollectorConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the HTTP surface listens on.
    pub listen_port: u16,
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Number of worker tasks draining the ingestion queue.
    pub workers: usize,
    /// Capacity of the bounded ingestion queue.
    pub buffer_size: usize,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Maximum number of traces retained before oldest-first eviction.
    pub max_traces: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level.
    pub level: LogLevel,
}

/// Log levels, mapped onto `tracing`'s `EnvFilter` directives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Converts to the string `tracing_subscriber::EnvFilter` expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = UrpoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(UrpoError::config(format!("unknown log level: {other}"))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            collector: CollectorConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { listen_port: 9090 }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            workers: 10,
            buffer_size: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig { max_traces: 10_000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Creates a new config with defaults, validated.
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration's numeric bounds.
    pub fn validate(&self) -> Result<()> {
        if self.server.listen_port == 0 {
            return Err(UrpoError::config("listen_port must be greater than 0"));
        }
        if self.collector.workers == 0 {
            return Err(UrpoError::config("workers must be greater than 0"));
        }
        if self.collector.buffer_size == 0 {
            return Err(UrpoError::config("buffer_size must be greater than 0"));
        }
        if self.storage.max_traces == 0 {
            return Err(UrpoError::config("max_traces must be greater than 0"));
        }
        Ok(())
    }
}

/// Builds a [`Config`] by layering defaults, an optional YAML file, environment
/// variables, and explicit overrides (typically CLI flags), in that order.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from defaults.
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Overlays a YAML config file, if it exists. A missing file is not an error.
    pub fn from_yaml_file(mut self, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(self);
        }
        let contents = std::fs::read_to_string(path)?;
        self.config = serde_yaml::from_str(&contents)?;
        Ok(self)
    }

    /// Overlays recognized environment variables (`PORT`, `WORKERS`,
    /// `BUFFER_SIZE`, `MAX_TRACES`, `LOG_LEVEL`).
    pub fn from_env(mut self) -> Self {
        if let Ok(v) = std::env::var("PORT") {
            if let Ok(port) = v.parse() {
                self.config.server.listen_port = port;
            }
        }
        if let Ok(v) = std::env::var("WORKERS") {
            if let Ok(n) = v.parse() {
                self.config.collector.workers = n;
            }
        }
        if let Ok(v) = std::env::var("BUFFER_SIZE") {
            if let Ok(n) = v.parse() {
                self.config.collector.buffer_size = n;
            }
        }
        if let Ok(v) = std::env::var("MAX_TRACES") {
            if let Ok(n) = v.parse() {
                self.config.storage.max_traces = n;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            if let Ok(level) = v.parse() {
                self.config.logging.level = level;
            }
        }
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.server.listen_port = port;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.collector.workers = workers;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.collector.buffer_size = buffer_size;
        self
    }

    pub fn max_traces(mut self, max_traces: usize) -> Self {
        self.config.storage.max_traces = max_traces;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Validates and returns the assembled configuration.
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
