use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to list directory {path}: {source}")]
    Listing { path: String, #[source] source: std::io::Error },

    #[error("failed to construct watcher for {path}: {source}")]
    WatcherInit { path: String, source: notify::Error },
}

pub type DetectResult<T> = std::result::Result<T, DetectError>;
