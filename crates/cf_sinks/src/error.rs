use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output directory {path}: {source}")]
    OutputDirCreate { path: String, #[source] source: std::io::Error },

    #[error("failed to write output file {path}: {source}")]
    FileWrite { path: String, #[source] source: std::io::Error },

    #[error("failed to serialize converter output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to connect to broker: {0}")]
    BrokerConnect(#[source] lapin::Error),

    #[error("failed to declare queue {queue}: {source}")]
    QueueDeclare { queue: String, #[source] source: lapin::Error },

    #[error("failed to publish to queue {queue}: {source}")]
    Publish { queue: String, #[source] source: lapin::Error },

    #[error("queue type {0:?} is not implemented")]
    NotImplemented(cf_protocol::QueueType),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;
