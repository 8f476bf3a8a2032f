//! Supervisor — spec.md §4.10.
//!
//! Loads route configuration, validates each route, constructs one
//! `RouteProcessor` per route, starts every route concurrently, and
//! coordinates cooperative shutdown. A route that fails validation or
//! construction is logged and skipped; it never stops other routes from
//! starting.

use std::time::Duration;

use cf_protocol::{load_routes_file, legacy_route_from_env, ConfigResult, RouteConfig};
use cf_route::RouteProcessor;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Resolve route configuration per spec.md §6: `ROUTES_CONFIG` switches to
/// multi-route mode; otherwise a single legacy route is synthesized from
/// the flat environment variables. The returned `bool` is multi-route mode,
/// which `cf_route`'s envelope/legacy-shape decision (Open Question 1)
/// depends on.
pub fn load_config() -> ConfigResult<(Vec<RouteConfig>, bool)> {
    match std::env::var("ROUTES_CONFIG") {
        Ok(path) => {
            let routes = load_routes_file(std::path::Path::new(&path))?;
            Ok((routes, true))
        }
        Err(_) => {
            let route = legacy_route_from_env()?;
            Ok((vec![route], false))
        }
    }
}

struct RouteHandle {
    name: String,
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Owns the set of running route processors. Route configurations are
/// read-only and owned for the lifetime of their processor; there is no
/// shared, mutable state between routes beyond the process-wide log sink.
pub struct Supervisor {
    handles: Vec<RouteHandle>,
}

impl Supervisor {
    /// Validate and start one `RouteProcessor` task per route. Returns
    /// immediately once every route has either started or been skipped —
    /// it does not wait for any route to finish.
    pub async fn start(routes: Vec<RouteConfig>, service_version: &str, multi_route_mode: bool) -> Self {
        let mut handles = Vec::with_capacity(routes.len());

        for route in routes {
            let name = route.name.clone();
            if let Err(err) = route.validate() {
                error!(route = %name, error = %err, "route failed validation, skipping");
                continue;
            }

            match RouteProcessor::build(route, service_version.to_string(), multi_route_mode).await {
                Ok(processor) => {
                    let (stop_tx, stop_rx) = watch::channel(false);
                    let join = tokio::spawn(processor.run(stop_rx));
                    info!(route = %name, "route started");
                    handles.push(RouteHandle { name, stop_tx, join });
                }
                Err(err) => {
                    error!(route = %name, error = %err, "route failed to start, skipping");
                }
            }
        }

        Self { handles }
    }

    /// Number of routes currently running (started successfully).
    pub fn active_route_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop every route's detector, then let each route's task drain and
    /// close its sink, bounded by `timeout`. Mirrors the teacher's
    /// bounded-wait-then-proceed shutdown (`casparian::main::run_unified`):
    /// a hung broker publish cannot block process exit forever.
    pub async fn shutdown(self, timeout: Duration) {
        for handle in &self.handles {
            let _ = handle.stop_tx.send(true);
        }

        let drain = async {
            for handle in self.handles {
                match handle.join.await {
                    Ok(()) => info!(route = %handle.name, "route drained"),
                    Err(err) => warn!(route = %handle.name, error = %err, "route task panicked during shutdown"),
                }
            }
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timeout exceeded; some routes may not have drained");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_protocol::{ArchiveConfig, InputConfig, OutputConfig, OutputType, ParsingConfig, WatchMode};

    fn route_with_bad_input_path() -> RouteConfig {
        RouteConfig {
            name: "broken".to_string(),
            ingestion_contract: None,
            input: InputConfig {
                path: "/nonexistent/definitely-missing".to_string(),
                watch_mode: WatchMode::Poll,
                poll_interval_seconds: 5,
                hybrid_poll_interval_seconds: 60,
                filename_pattern: ".*".to_string(),
                suffix_filter: vec![],
                max_files_per_poll: 0,
                readiness_interval_ms: 2000,
            },
            parsing: ParsingConfig::default(),
            output: OutputConfig {
                output_type: OutputType::File,
                destination: "/tmp/wherever".to_string(),
                include_envelope: true,
                queue_type: None,
                broker_uri: None,
                log_queue_messages: false,
            },
            archive: ArchiveConfig {
                processed_path: "/tmp/processed".to_string(),
                failed_path: "/tmp/failed".to_string(),
                ignored_path: None,
                timestamp_naming: false,
            },
        }
    }

    #[tokio::test]
    async fn invalid_route_is_skipped_not_fatal() {
        let supervisor = Supervisor::start(vec![route_with_bad_input_path()], "1.0.0", true).await;
        assert_eq!(supervisor.active_route_count(), 0);
        supervisor.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn valid_route_starts_and_drains_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("in");
        std::fs::create_dir_all(&input_dir).unwrap();

        let mut route = route_with_bad_input_path();
        route.name = "ok".to_string();
        route.input.path = input_dir.to_string_lossy().to_string();
        route.archive.processed_path = dir.path().join("processed").to_string_lossy().to_string();
        route.archive.failed_path = dir.path().join("failed").to_string_lossy().to_string();
        route.output.destination = dir.path().join("out").to_string_lossy().to_string();

        let supervisor = Supervisor::start(vec![route], "1.0.0", true).await;
        assert_eq!(supervisor.active_route_count(), 1);
        supervisor.shutdown(Duration::from_secs(2)).await;
    }
}
