//! Pluggable sink contract — spec.md "Pluggable sinks" (REDESIGN FLAGS) and
//! §4.6 Dual Sink. One common operation, `send`, with three variants.

use serde_json::Value;

use crate::error::SinkResult;
use crate::file_sink::FileSink;
use crate::queue_sink::QueueSink;

/// What a Processor hands to a sink for one file: the converter output
/// (file sinks only ever see this) and the fully assembled message body
/// (envelope or legacy shape, queue sinks only ever see this).
pub struct SinkRequest<'a> {
    pub basename: &'a str,
    pub converter_output: &'a Value,
    pub message_bytes: &'a [u8],
}

pub enum Sink {
    File(FileSink),
    Queue(QueueSink),
    Dual(FileSink, QueueSink),
}

impl Sink {
    /// File write happens before queue publish in `Dual` mode. If the file
    /// write fails, the queue is never contacted; if the queue publish
    /// fails, the file that was already written remains on disk.
    pub async fn send(&self, request: &SinkRequest<'_>) -> SinkResult<()> {
        match self {
            Sink::File(file) => {
                file.send(request.basename, request.converter_output).await?;
                Ok(())
            }
            Sink::Queue(queue) => queue.publish(request.message_bytes).await,
            Sink::Dual(file, queue) => {
                file.send(request.basename, request.converter_output).await?;
                queue.publish(request.message_bytes).await
            }
        }
    }

    pub async fn close(&self) {
        match self {
            Sink::File(_) => {}
            Sink::Queue(queue) => queue.close().await,
            Sink::Dual(_, queue) => queue.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn file_only_sink_writes_converter_output() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::File(FileSink::new(dir.path()));
        let payload = json!([{"id": "1"}]);
        let request = SinkRequest {
            basename: "data.csv",
            converter_output: &payload,
            message_bytes: b"{}",
        };
        sink.send(&request).await.unwrap();
        assert!(dir.path().join("data.json").exists());
    }
}
