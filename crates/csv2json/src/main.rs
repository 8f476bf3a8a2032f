//! csv2json: watches one or more route directories, parses CSV drops
//! strictly, converts to order-preserving JSON, stamps a provenance
//! envelope, delivers to a file and/or AMQP sink, and archives every input
//! into exactly one of `processed`/`ignored`/`failed`. See `SPEC_FULL.md`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use cf_logging::LogConfig;
use cf_supervisor::Supervisor;

const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// File-drop CSV-to-JSON ingestion engine. Configuration is read entirely
/// from the environment (and an optional `.env` file); there is no
/// subcommand surface — running the binary starts the supervised engine.
#[derive(Parser, Debug)]
#[command(
    name = "csv2json",
    about = "File-drop CSV-to-JSON ingestion engine",
    disable_version_flag = true
)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", short = 'V')]
    version: bool,
}

fn version_string() -> String {
    format!(
        "csv2json v{} (commit: {}) (built: {})",
        env!("CARGO_PKG_VERSION"),
        env!("CSV2JSON_BUILD_COMMIT"),
        env!("CSV2JSON_BUILD_TIMESTAMP"),
    )
}

/// clap only recognizes double-dash long flags; spec.md's `-version`/`-help`
/// (single-dash, Go-style) are scanned for manually before clap ever parses
/// `std::env::args()`.
fn handle_single_dash_flags() {
    let mut args = std::env::args().skip(1);
    if let Some(first) = args.next() {
        match first.as_str() {
            "-version" => {
                println!("{}", version_string());
                std::process::exit(0);
            }
            "-help" => {
                println!("csv2json — file-drop CSV-to-JSON ingestion engine");
                println!();
                println!("USAGE:\n    csv2json [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -V, --version    Print version information and exit");
                println!("    -h, --help       Print help information and exit");
                std::process::exit(0);
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    handle_single_dash_flags();

    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_string());
        return Ok(());
    }

    // Optional `.env` file in the working directory; a missing file is not
    // an error (spec.md §6's three-tier precedence).
    let _ = dotenvy::dotenv();

    cf_logging::init_logging(LogConfig::from_env())?;

    let (routes, multi_route_mode) = match cf_supervisor::load_config() {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "failed to load route configuration");
            std::process::exit(1);
        }
    };

    if routes.is_empty() {
        warn!("no routes configured; exiting");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(routes, multi_route_mode))
}

async fn run(routes: Vec<cf_protocol::RouteConfig>, multi_route_mode: bool) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        routes = routes.len(),
        multi_route_mode,
        "starting csv2json"
    );

    let supervisor = Supervisor::start(routes, env!("CARGO_PKG_VERSION"), multi_route_mode).await;
    if supervisor.active_route_count() == 0 {
        error!("no routes started successfully; exiting");
        std::process::exit(1);
    }
    info!(active_routes = supervisor.active_route_count(), "engine running");

    let shutdown_flag = Arc::new(AtomicBool::new(false));

    #[cfg(unix)]
    {
        let shutdown_flag_handler = shutdown_flag.clone();
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        std::thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!(signal = sig, "received signal, initiating shutdown");
                shutdown_flag_handler.store(true, Ordering::SeqCst);
            }
        });
    }

    #[cfg(windows)]
    {
        let shutdown_flag_handler = shutdown_flag.clone();
        ctrlc::set_handler(move || {
            info!("received Ctrl+C, initiating shutdown");
            shutdown_flag_handler.store(true, Ordering::SeqCst);
        })?;
    }

    while !shutdown_flag.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    info!(timeout_secs = SHUTDOWN_TIMEOUT_SECS, "initiating graceful shutdown");
    supervisor
        .shutdown(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS))
        .await;
    info!("shutdown complete");

    Ok(())
}
