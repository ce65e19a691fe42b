use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Configuration file not found: {0}\n\
        Hint: pass the path explicitly, set SENTINEL_CONNECTOR_CONFIG, \
        or run without --non-interactive to be prompted for the settings"
    )]
    NotFound(PathBuf),

    #[error("Required setting '{0}' is missing or empty")]
    MissingRequired(&'static str),

    #[error("Invalid setting '{key}': {message}")]
    Invalid { key: &'static str, message: String },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
