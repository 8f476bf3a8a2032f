//! Route Processor — spec.md §4.9.
//!
//! One `RouteProcessor` per route owns its detector, sink, and archiver and
//! drives the per-file state machine sequentially: filter -> validate ->
//! parse -> convert -> envelope -> sink -> archive -> report. An error
//! escaping any step for one file is captured here and collapses into an
//! archive outcome; it never terminates the detector loop.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cf_archive::{Archiver, Category};
use cf_protocol::{
    build_envelope, build_legacy_envelope, EnvelopeContext, OutputType, QueueType, RouteConfig,
};
use cf_sinks::{FileSink, QueueSink, Sink, SinkRequest};
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{RouteError, RouteResult};

enum Outcome {
    Processed { rows: usize },
    Ignored { reason: &'static str },
    Failed { reason: String },
}

pub struct RouteProcessor {
    route: RouteConfig,
    sink: Sink,
    archiver: Archiver,
    filename_pattern: Regex,
    suffix_set: HashSet<String>,
    service_version: String,
    multi_route_mode: bool,
}

impl RouteProcessor {
    /// Construct the sink and archiver for `route`. The caller is expected
    /// to have already run `RouteConfig::validate` (regex compile, input
    /// path existence, archive directory creation); construction here
    /// covers what `validate` cannot check ahead of time — opening the
    /// broker connection.
    pub async fn build(
        route: RouteConfig,
        service_version: String,
        multi_route_mode: bool,
    ) -> RouteResult<Self> {
        let filename_pattern = route
            .compile_filename_pattern()
            .expect("filename pattern validated at startup");
        let suffix_set = route.suffix_set();

        let sink = build_sink(&route)
            .await
            .map_err(|source| RouteError::SinkConstruction {
                route: route.name.clone(),
                source,
            })?;

        let archiver = Archiver::new(
            PathBuf::from(&route.archive.processed_path),
            PathBuf::from(&route.archive.failed_path),
            route.archive.ignored_path.as_deref().map(PathBuf::from),
            route.archive.timestamp_naming,
        );

        Ok(Self {
            route,
            sink,
            archiver,
            filename_pattern,
            suffix_set,
            service_version,
            multi_route_mode,
        })
    }

    pub fn name(&self) -> &str {
        &self.route.name
    }

    /// Run until `stop_rx` reports `true`. Per-file processing is
    /// sequential: a file started before the shutdown signal always runs
    /// to completion. The detector is stopped first, then the sink closed.
    pub async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        let (detector, mut ready_rx) = cf_detector::spawn(self.route.name.clone(), self.route.input.clone());

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
                next = ready_rx.recv() => {
                    match next {
                        Some(path) => self.process_one(&path).await,
                        None => break,
                    }
                }
            }
        }

        detector.stop().await;
        self.sink.close().await;
        info!(route = %self.route.name, "route processor stopped");
    }

    async fn process_one(&self, path: &Path) {
        let start = Instant::now();
        let basename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let (category, rows, reason) = match self.decide(path, &basename).await {
            Outcome::Processed { rows } => (Category::Processed, rows, None),
            Outcome::Ignored { reason } => (Category::Ignored, 0, Some(reason.to_string())),
            Outcome::Failed { reason } => (Category::Failed, 0, Some(reason)),
        };

        let outcome_label = match category {
            Category::Processed => "processed",
            Category::Ignored => "ignored",
            Category::Failed => "failed",
        };

        if let Err(err) = self.archiver.archive(path, category, reason.as_deref()).await {
            error!(
                route = %self.route.name,
                file = %basename,
                error = %err,
                "failed to archive input; it may remain in the input directory for re-detection"
            );
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match category {
            Category::Failed => warn!(
                route = %self.route.name,
                file = %basename,
                rows,
                outcome = outcome_label,
                elapsed_ms,
                reason = reason.as_deref().unwrap_or(""),
                "file processing outcome"
            ),
            _ => info!(
                route = %self.route.name,
                file = %basename,
                rows,
                outcome = outcome_label,
                elapsed_ms,
                "file processing outcome"
            ),
        }
    }

    /// Steps 1-4 of spec.md §4.9: decide what happens to one file without
    /// touching the archiver. Kept separate from `process_one` so a panic
    /// inside any step still lets its caller record a single outcome.
    async fn decide(&self, path: &Path, basename: &str) -> Outcome {
        if !self.passes_filter(basename) {
            return Outcome::Ignored {
                reason: "filename/suffix filter miss",
            };
        }

        let delimiter = self.route.parsing.delimiter as u8;
        let quote = self.route.parsing.quote_char as u8;

        if let Err(err) = cf_parser::validate(path, delimiter) {
            return Outcome::Failed { reason: err.to_string() };
        }

        let parsed = match cf_parser::parse_ordered(path, delimiter, quote, self.route.parsing.has_header)
        {
            Ok(parsed) => parsed,
            Err(err) => return Outcome::Failed { reason: err.to_string() },
        };

        let rows = parsed.row_count();
        let data = cf_parser::to_json_value(&parsed);

        let message_bytes = match self.build_message_bytes(path, basename, data.clone()) {
            Ok(bytes) => bytes,
            Err(err) => {
                return Outcome::Failed {
                    reason: format!("failed to serialize message: {err}"),
                }
            }
        };

        if self.route.output.log_queue_messages
            && matches!(self.route.output.output_type, OutputType::Queue | OutputType::Both)
        {
            debug!(
                route = %self.route.name,
                file = %basename,
                body = %String::from_utf8_lossy(&message_bytes),
                "queue message body"
            );
        }

        let request = SinkRequest {
            basename,
            converter_output: &data,
            message_bytes: &message_bytes,
        };
        match self.sink.send(&request).await {
            Ok(()) => Outcome::Processed { rows },
            Err(err) => Outcome::Failed { reason: err.to_string() },
        }
    }

    fn passes_filter(&self, basename: &str) -> bool {
        if !self.filename_pattern.is_match(basename) {
            return false;
        }
        if self.suffix_set.is_empty() {
            return true;
        }
        let ext = Path::new(basename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()));
        match ext {
            Some(ext) => self.suffix_set.contains(&ext),
            None => false,
        }
    }

    /// Wrap converter output in the provenance envelope (spec.md §4.3) or
    /// the legacy `{identifier, data}` shape (Open Question 1, §12:
    /// envelope when `includeEnvelope` is true or multi-route mode is
    /// active; legacy shape otherwise). File sinks never see this — only
    /// queue deliveries carry the wrapped shape.
    fn build_message_bytes(
        &self,
        path: &Path,
        basename: &str,
        data: Value,
    ) -> serde_json::Result<Vec<u8>> {
        let use_envelope = self.route.output.include_envelope || self.multi_route_mode;
        let queue_enabled = matches!(self.route.output.output_type, OutputType::Queue | OutputType::Both);
        let source_path = path.display().to_string();

        let ctx = EnvelopeContext {
            route_name: &self.route.name,
            ingestion_contract: self.route.ingestion_contract.as_deref(),
            source_path: &source_path,
            source_basename: basename,
            queue_name: queue_enabled.then(|| self.route.output.queue_destination()),
            broker_uri: if queue_enabled {
                self.route.output.broker_uri.as_deref()
            } else {
                None
            },
            service_version: &self.service_version,
        };

        if use_envelope {
            serde_json::to_vec(&build_envelope(&ctx, data, Utc::now()))
        } else {
            serde_json::to_vec(&build_legacy_envelope(&ctx, data))
        }
    }
}

async fn build_sink(route: &RouteConfig) -> cf_sinks::SinkResult<Sink> {
    match route.output.output_type {
        OutputType::File => Ok(Sink::File(FileSink::new(route.output.file_destination()))),
        OutputType::Queue => {
            let queue = connect_queue(route).await?;
            Ok(Sink::Queue(queue))
        }
        OutputType::Both => {
            let file = FileSink::new(route.output.file_destination());
            let queue = connect_queue(route).await?;
            Ok(Sink::Dual(file, queue))
        }
    }
}

async fn connect_queue(route: &RouteConfig) -> cf_sinks::SinkResult<QueueSink> {
    let queue_type = route.output.queue_type.unwrap_or(QueueType::Rabbitmq);
    let broker_uri = route.output.broker_uri.as_deref().unwrap_or_default();
    QueueSink::connect(queue_type, broker_uri, route.output.queue_destination()).await
}
