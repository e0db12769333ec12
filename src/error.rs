//! Error types for the greeting server.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .path.display(), .source)]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {}", .path.display(), .source)]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors that stop the server from serving.
///
/// Per-connection faults never show up here; they are logged and confined
/// to the connection that produced them.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listening socket could not be bound (in use, permission denied, ...).
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The bound socket could not report its own address.
    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
