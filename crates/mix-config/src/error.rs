//! Error types for configuration loading

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config directory could be determined for this user
    #[error("could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the config file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the config model
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the config failed
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The handle has no backing file to reload from
    #[error("config has no backing file")]
    NotFileBacked,
}
