//! Command-line interface.
//!
//! Parses process configuration (flags overlaying environment variables
//! overlaying an optional YAML file) and initializes structured logging.

use crate::core::config::{ConfigBuilder, LogLevel};
use crate::core::{Config, Result};
use clap::Parser;
use std::path::PathBuf;

/// Distributed-tracing collector: HTTP span ingestion and in-memory storage.
#[derive(Parser, Debug)]
#[command(name = "tracecollector")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Port the HTTP surface listens on.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Number of worker tasks draining the ingestion queue.
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,

    /// Capacity of the bounded ingestion queue.
    #[arg(long, env = "BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// Maximum number of traces retained before oldest-first eviction.
    #[arg(long, env = "MAX_TRACES")]
    pub max_traces: Option<usize>,

    /// Minimum log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Optional path to a YAML configuration file.
    #[arg(short, long, env = "CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Loads configuration by layering defaults, an optional YAML file,
    /// environment variables, then CLI flags, in that order.
    pub fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();
        if let Some(path) = &self.config {
            builder = builder.from_yaml_file(path)?;
        }
        builder = builder.from_env();

        if let Some(port) = self.port {
            builder = builder.listen_port(port);
        }
        if let Some(workers) = self.workers {
            builder = builder.workers(workers);
        }
        if let Some(buffer_size) = self.buffer_size {
            builder = builder.buffer_size(buffer_size);
        }
        if let Some(max_traces) = self.max_traces {
            builder = builder.max_traces(max_traces);
        }
        if let Some(level) = &self.log_level {
            builder = builder.log_level(level.parse::<LogLevel>()?);
        }

        builder.build()
    }

    /// Initializes `tracing` with the configured log level, respecting
    /// `RUST_LOG` if set.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

        tracing_subscriber::fmt().with_env_filter(filter).init();
        Ok(())
    }
}
