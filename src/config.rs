//! Configuration module for the greeting server.
//!
//! Supports command-line arguments, the `PORT` environment variable and a
//! TOML configuration file. CLI arguments (and `PORT`) take precedence over
//! config file values.

use crate::error::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Command-line arguments for the greeting server
#[derive(Parser, Debug, Default)]
#[command(name = "hello-listener")]
#[command(author = "hello-listener authors")]
#[command(version = "0.1.0")]
#[command(about = "A concurrent TCP greeting server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Interface to bind to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Capacity of the per-connection read buffer in bytes
    #[arg(short = 'b', long)]
    pub buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of worker threads
    pub workers: Option<usize>,
    /// Read buffer capacity per connection
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            buffer_size: default_buffer_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_buffer_size() -> usize {
    16 * 1024 // 16 KB
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub buffer_size: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args, environment and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve configuration from already-parsed arguments.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = match cli.config {
            Some(ref config_path) => read_toml(config_path)?,
            None => TomlConfig::default(),
        };

        Ok(Config::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            workers: cli.workers.or(toml_config.server.workers),
            buffer_size: cli.buffer_size.unwrap_or(toml_config.server.buffer_size),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }

    /// Address the listener binds to, as `host:port`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::merge(CliArgs::default(), TomlConfig::default())
    }
}

fn read_toml(path: &Path) -> Result<TomlConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}
