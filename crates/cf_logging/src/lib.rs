//! Shared logging setup for the csv2json binary and its route processors.
//!
//! Two destinations, both driven by one `EnvFilter`: stdout, always, and an
//! optional append-mode file when `LOG_FILE` is configured — spec.md §6
//! ("logs written to stdout and optionally to a log file (append mode)").

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "csv2json=info,cf_route=info,cf_supervisor=info,cf_detector=info";

/// Logging configuration resolved from `LOG_LEVEL` / `LOG_FILE`.
pub struct LogConfig {
    /// `RUST_LOG`-style filter string (`LOG_LEVEL`); falls back to
    /// `DEFAULT_LOG_FILTER` when unset.
    pub level: Option<String>,
    /// Append-mode log file path (`LOG_FILE`); logging to stdout only when
    /// `None`.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Build from the `LOG_LEVEL` / `LOG_FILE` environment variables.
    pub fn from_env() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").ok(),
            file: std::env::var("LOG_FILE").ok().map(PathBuf::from),
        }
    }
}

/// Initialize the global `tracing` subscriber. Idempotent per-process: call
/// once from `main`.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let filter_str = config.level.unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let stdout_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(stdout_filter);

    match config.file {
        Some(path) => {
            let file_filter =
                EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
            let writer = SharedAppendWriter::open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter);

            tracing_subscriber::registry()
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry().with(stdout_layer).init();
        }
    }

    Ok(())
}

#[derive(Clone)]
struct SharedAppendWriter {
    inner: Arc<Mutex<File>>,
}

impl SharedAppendWriter {
    fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

struct SharedAppendWriterGuard {
    inner: Arc<Mutex<File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedAppendWriter {
    type Writer = SharedAppendWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedAppendWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedAppendWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.flush()
    }
}
