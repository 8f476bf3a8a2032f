use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to move {from} to {to}: {source}")]
    Move { from: String, to: String, #[source] source: std::io::Error },

    #[error("failed to create archive directory {path}: {source}")]
    DirCreate { path: String, #[source] source: std::io::Error },
}

pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;
