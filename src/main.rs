//! Fricu data server (v1)
//!
//! Persists a fixed set of named JSON documents for the training client.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────────┐
//!                 │                     FRICU SERVER                      │
//!                 │                                                       │
//!   Client  ──────┼─▶ listener (one socket, duplicated per worker)        │
//!                 │        │                                              │
//!                 │        ▼                                              │
//!                 │  ┌──────────┐ ┌──────────┐       ┌──────────┐         │
//!                 │  │ worker 0 │ │ worker 1 │  ...  │ worker N │         │
//!                 │  │ poll     │ │ poll     │       │ poll     │         │
//!                 │  │ framing  │ │ framing  │       │ framing  │         │
//!                 │  │ handler  │ │ handler  │       │ handler  │         │
//!                 │  │ sqlite   │ │ sqlite   │       │ sqlite   │         │
//!                 │  └────┬─────┘ └────┬─────┘       └────┬─────┘         │
//!                 │       └────────────┴──────┬───────────┘               │
//!                 │                           ▼                           │
//!                 │                 fricu_server.db (WAL)                 │
//!                 │                                                       │
//!                 │  config · lifecycle · observability · resilience      │
//!                 └───────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fricu_server::config::{self, ServerConfig};
use fricu_server::lifecycle::{self, signals};
use fricu_server::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "fricu-server", version, about = "Fricu JSON document server")]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long, env = "FRICU_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match config::loader::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fricu-server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("fricu-server: {e}");
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fricu-server starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        workers = config.workers.effective_count(),
        database = %config.storage.path,
        idle_timeout_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let handle = lifecycle::start(config)?;
    tracing::info!(
        address = %handle.local_addr(),
        workers = handle.workers(),
        "Ready; press Ctrl+C to stop"
    );

    let waited = signals::wait_for_signal();
    handle.shutdown();
    if let Err(e) = waited {
        tracing::error!(error = %e, "Signal handling failed");
    }

    handle.join()?;
    tracing::info!("Shutdown complete");
    Ok(())
}
