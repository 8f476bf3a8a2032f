//! Hybrid file-detection state machine — spec.md §4.8.
//!
//! Three modes share one emit contract: at most one emission per file
//! basename over the detector's lifetime, issued only when the file is
//! stable and not already in the processed-file registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cf_protocol::{InputConfig, WatchMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::readiness::is_file_ready;
use crate::registry::ProcessedRegistry;

/// Pluggable detection strategy (teacher's `ScanEngine` trait pattern in
/// `casparian_scout::engine`): one trait, three interchangeable strategies,
/// selected by `input.watch_mode` once per route in `select_detector`.
#[async_trait::async_trait]
trait Detector: Send + Sync {
    async fn run(
        &self,
        route_name: &str,
        input: &InputConfig,
        registry: Arc<Mutex<ProcessedRegistry>>,
        ready_tx: mpsc::Sender<PathBuf>,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> crate::error::DetectResult<()>;
}

struct PollDetector;
struct EventDetector;
struct HybridDetector;

#[async_trait::async_trait]
impl Detector for PollDetector {
    async fn run(
        &self,
        route_name: &str,
        input: &InputConfig,
        registry: Arc<Mutex<ProcessedRegistry>>,
        ready_tx: mpsc::Sender<PathBuf>,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> crate::error::DetectResult<()> {
        run_poll_loop(route_name, input, registry, ready_tx, stop_rx).await
    }
}

#[async_trait::async_trait]
impl Detector for EventDetector {
    async fn run(
        &self,
        route_name: &str,
        input: &InputConfig,
        registry: Arc<Mutex<ProcessedRegistry>>,
        ready_tx: mpsc::Sender<PathBuf>,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> crate::error::DetectResult<()> {
        run_event_mode(route_name, input, registry, ready_tx, stop_rx).await
    }
}

#[async_trait::async_trait]
impl Detector for HybridDetector {
    async fn run(
        &self,
        route_name: &str,
        input: &InputConfig,
        registry: Arc<Mutex<ProcessedRegistry>>,
        ready_tx: mpsc::Sender<PathBuf>,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> crate::error::DetectResult<()> {
        run_hybrid_mode(route_name, input, registry, ready_tx, stop_rx).await
    }
}

/// Select the detection strategy for a route's configured `WatchMode`.
fn select_detector(mode: WatchMode) -> Box<dyn Detector> {
    match mode {
        WatchMode::Poll => Box::new(PollDetector),
        WatchMode::Event => Box::new(EventDetector),
        WatchMode::Hybrid => Box::new(HybridDetector),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// A handle to a running detector task. Dropping it does not stop the
/// detector; call `stop().await` for a cooperative shutdown.
pub struct DetectorHandle {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<DetectorState>,
    join: tokio::task::JoinHandle<()>,
}

impl DetectorHandle {
    pub fn state(&self) -> DetectorState {
        *self.state_rx.borrow()
    }

    /// Signal the detector to stop and wait for it to drain.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.join.await;
    }
}

/// Spawn a detector for one route's input configuration. Returns a handle
/// plus a channel of ready file paths, emitted in the order described by the
/// configured mode.
pub fn spawn(route_name: String, input: InputConfig) -> (DetectorHandle, mpsc::Receiver<PathBuf>) {
    let (ready_tx, ready_rx) = mpsc::channel(256);
    let (stop_tx, stop_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(DetectorState::Starting);

    let join = tokio::spawn(run(route_name, input, ready_tx, stop_rx, state_tx));

    (
        DetectorHandle {
            stop_tx,
            state_rx,
            join,
        },
        ready_rx,
    )
}

async fn run(
    route_name: String,
    input: InputConfig,
    ready_tx: mpsc::Sender<PathBuf>,
    mut stop_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<DetectorState>,
) {
    let registry = Arc::new(Mutex::new(ProcessedRegistry::new()));

    if let Err(err) = startup_scan(Path::new(&input.path), &registry).await {
        warn!(route = %route_name, error = %err, "detector startup scan failed");
    }

    let _ = state_tx.send(DetectorState::Running);

    let detector = select_detector(input.watch_mode);
    let result = detector
        .run(&route_name, &input, registry, ready_tx, &mut stop_rx)
        .await;

    if let Err(err) = result {
        warn!(route = %route_name, error = %err, "detector loop exited with error");
    }

    let _ = state_tx.send(DetectorState::Stopping);
    let _ = state_tx.send(DetectorState::Stopped);
    info!(route = %route_name, "detector stopped");
}

async fn startup_scan(dir: &Path, registry: &Arc<Mutex<ProcessedRegistry>>) -> std::io::Result<()> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut registry = registry.lock().await;
    while let Some(entry) = read_dir.next_entry().await? {
        if let Ok(file_type) = entry.file_type().await {
            if file_type.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    registry.insert(name.to_string());
                }
            }
        }
    }
    debug!(skipped = registry.len(), "startup scan complete");
    Ok(())
}

/// Event mode: watch the directory for create/write events. Falls back to
/// poll mode transparently if watcher construction fails.
async fn run_event_mode(
    route_name: &str,
    input: &InputConfig,
    registry: Arc<Mutex<ProcessedRegistry>>,
    ready_tx: mpsc::Sender<PathBuf>,
    stop_rx: &mut watch::Receiver<bool>,
) -> crate::error::DetectResult<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        },
        notify::Config::default(),
    )
    .and_then(|mut watcher| {
        watcher.watch(Path::new(&input.path), RecursiveMode::NonRecursive)?;
        Ok(watcher)
    });

    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(err) => {
            warn!(route = %route_name, error = %err, "event watcher construction failed, falling back to poll mode");
            return run_poll_loop(route_name, input, registry, ready_tx, stop_rx).await;
        }
    };

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(Ok(event)) => {
                        handle_notify_event(route_name, input, &registry, &ready_tx, event).await;
                    }
                    Some(Err(err)) => {
                        warn!(route = %route_name, error = %err, "watcher event error");
                    }
                    None => break,
                }
            }
        }
    }

    let _ = watcher.unwatch(Path::new(&input.path));
    Ok(())
}

async fn handle_notify_event(
    route_name: &str,
    input: &InputConfig,
    registry: &Arc<Mutex<ProcessedRegistry>>,
    ready_tx: &mpsc::Sender<PathBuf>,
    event: Event,
) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }
    for path in event.paths {
        try_emit(route_name, input, registry, ready_tx, &path, usize::MAX, &mut 0).await;
    }
}

/// Hybrid mode: the event watcher runs as primary; a backup poll loop on
/// `hybrid_poll_interval_seconds` bounds worst-case detection latency.
async fn run_hybrid_mode(
    route_name: &str,
    input: &InputConfig,
    registry: Arc<Mutex<ProcessedRegistry>>,
    ready_tx: mpsc::Sender<PathBuf>,
    stop_rx: &mut watch::Receiver<bool>,
) -> crate::error::DetectResult<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        },
        notify::Config::default(),
    )
    .and_then(|mut watcher| {
        watcher.watch(Path::new(&input.path), RecursiveMode::NonRecursive)?;
        Ok(watcher)
    });

    let mut watcher = match watcher {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            warn!(route = %route_name, error = %err, "event watcher construction failed in hybrid mode, running backup poll only");
            None
        }
    };

    let mut backup_ticker = tokio::time::interval(Duration::from_secs(input.hybrid_poll_interval_seconds));
    backup_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
            event = event_rx.recv(), if watcher.is_some() => {
                match event {
                    Some(Ok(event)) => {
                        handle_notify_event(route_name, input, &registry, &ready_tx, event).await;
                    }
                    Some(Err(err)) => {
                        warn!(route = %route_name, error = %err, "watcher event error");
                    }
                    None => {}
                }
            }
            _ = backup_ticker.tick() => {
                if let Err(err) = poll_cycle(route_name, input, &registry, &ready_tx).await {
                    warn!(route = %route_name, error = %err, "backup poll cycle failed");
                }
            }
        }
    }

    if let Some(mut watcher) = watcher.take() {
        let _ = watcher.unwatch(Path::new(&input.path));
    }
    Ok(())
}

async fn run_poll_loop(
    route_name: &str,
    input: &InputConfig,
    registry: Arc<Mutex<ProcessedRegistry>>,
    ready_tx: mpsc::Sender<PathBuf>,
    stop_rx: &mut watch::Receiver<bool>,
) -> crate::error::DetectResult<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(input.poll_interval_seconds));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = poll_cycle(route_name, input, &registry, &ready_tx).await {
                    warn!(route = %route_name, error = %err, "poll cycle failed");
                }
            }
        }
    }
    Ok(())
}

async fn poll_cycle(
    route_name: &str,
    input: &InputConfig,
    registry: &Arc<Mutex<ProcessedRegistry>>,
    ready_tx: &mpsc::Sender<PathBuf>,
) -> std::io::Result<()> {
    let mut read_dir = tokio::fs::read_dir(&input.path).await?;
    let mut emitted_this_cycle = 0usize;
    let limit = if input.max_files_per_poll == 0 {
        usize::MAX
    } else {
        input.max_files_per_poll
    };

    while let Some(entry) = read_dir.next_entry().await? {
        if emitted_this_cycle >= limit {
            break;
        }
        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(_) => continue,
        };
        if !file_type.is_file() {
            continue;
        }
        try_emit(
            route_name,
            input,
            registry,
            ready_tx,
            &entry.path(),
            limit,
            &mut emitted_this_cycle,
        )
        .await;
    }
    Ok(())
}

async fn try_emit(
    route_name: &str,
    input: &InputConfig,
    registry: &Arc<Mutex<ProcessedRegistry>>,
    ready_tx: &mpsc::Sender<PathBuf>,
    path: &Path,
    limit: usize,
    emitted_this_cycle: &mut usize,
) {
    if *emitted_this_cycle >= limit {
        return;
    }
    let Some(basename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
        return;
    };

    {
        let registry = registry.lock().await;
        if registry.contains(&basename) {
            return;
        }
    }

    if !is_file_ready(path, input.readiness_interval_ms).await {
        return;
    }

    let is_new = {
        let mut registry = registry.lock().await;
        registry.insert(basename.clone())
    };
    if !is_new {
        return;
    }

    *emitted_this_cycle += 1;
    debug!(route = %route_name, file = %basename, "emitting ready file");
    if ready_tx.send(path.to_path_buf()).await.is_err() {
        warn!(route = %route_name, file = %basename, "ready channel closed, dropping emission");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_protocol::WatchMode;
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    fn test_input(path: PathBuf) -> InputConfig {
        InputConfig {
            path: path.to_string_lossy().to_string(),
            watch_mode: WatchMode::Poll,
            poll_interval_seconds: 1,
            hybrid_poll_interval_seconds: 60,
            filename_pattern: ".*".to_string(),
            suffix_filter: Vec::new(),
            max_files_per_poll: 0,
            readiness_interval_ms: 5,
        }
    }

    #[tokio::test]
    async fn startup_skips_pre_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("existing.csv"), b"a,b\n1,2\n").unwrap();

        let input = test_input(dir.path().to_path_buf());
        let (handle, mut ready_rx) = spawn("route".to_string(), input);

        let result = timeout(StdDuration::from_millis(300), ready_rx.recv()).await;
        assert!(result.is_err(), "pre-existing file must not be emitted");

        handle.stop().await;
    }

    #[tokio::test]
    async fn poll_mode_emits_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = test_input(dir.path().to_path_buf());
        let (handle, mut ready_rx) = spawn("route".to_string(), input);

        std::fs::write(dir.path().join("new.csv"), b"a,b\n1,2\n").unwrap();

        let result = timeout(StdDuration::from_secs(3), ready_rx.recv()).await;
        assert!(result.is_ok());
        let path = result.unwrap().unwrap();
        assert_eq!(path.file_name().unwrap(), "new.csv");

        handle.stop().await;
    }

    #[tokio::test]
    async fn rate_limit_bounds_emissions_per_cycle() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{i}.csv")), b"a\n1\n").unwrap();
        }
        let registry = Arc::new(Mutex::new(ProcessedRegistry::new()));
        let mut input = test_input(dir.path().to_path_buf());
        input.max_files_per_poll = 2;
        let (ready_tx, mut ready_rx) = mpsc::channel(16);

        poll_cycle("route", &input, &registry, &ready_tx).await.unwrap();
        drop(ready_tx);

        let mut count = 0;
        while ready_rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
