//! File and AMQP delivery for converted route payloads. See `SPEC_FULL.md`
//! §5.4-5.6.

pub mod error;
pub mod file_sink;
pub mod queue_sink;
pub mod sink;

pub use error::{SinkError, SinkResult};
pub use file_sink::FileSink;
pub use queue_sink::QueueSink;
pub use sink::{Sink, SinkRequest};
