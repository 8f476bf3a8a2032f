use thiserror::Error;

/// Errors raised while loading or validating route configuration.
///
/// Surfaced at startup; a `ConfigError` is always fatal for the process
/// (exit code 1) before any route begins running.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse routes JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("route {route}: {message}")]
    InvalidRoute { route: String, message: String },

    #[error("route {route}: invalid filename pattern {pattern:?}: {source}")]
    InvalidPattern {
        route: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("route {route}: input path {path} does not exist")]
    InputPathMissing { route: String, path: String },

    #[error("route {route}: failed to create archive directory {path}: {source}")]
    ArchiveDirCreate {
        route: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
