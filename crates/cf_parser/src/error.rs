use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, #[source] source: std::io::Error },

    #[error("failed to read {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("structural error: {0}")]
    Structural(String),
}

impl ParseError {
    pub fn structural(message: impl Into<String>) -> Self {
        ParseError::Structural(message.into())
    }
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;
