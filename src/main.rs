//! Configuration Registry
//!
//! An HTTP service that stores named, versioned configurations and
//! configuration groups. Groups never change in place: every add or remove
//! of an entry publishes a new version.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ request id → trace → body limit → timeout → in-flight
//!                          │
//!                          ▼
//!                      rate limit → idempotency replay
//!                          │
//!                          ▼
//!                      handlers ──▶ registry ──▶ stores
//!                                      │
//!                                      └──▶ versioning engine (copy-on-write)
//!
//!     Cross-cutting: config (+ hot reload), observability, lifecycle
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use config_registry::config::loader::load_or_default;
use config_registry::config::watcher::ConfigWatcher;
use config_registry::http::HttpServer;
use config_registry::lifecycle::{
    bind_address, build_registry, wait_for_shutdown_signal, Shutdown,
};
use config_registry::net::load_tls_config;
use config_registry::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "config-registry", version, about = "Versioned configuration registry")]
struct Args {
    /// Path to a TOML config file. Watched for changes when given.
    #[arg(short, long, env = "REGISTRY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Load the demo config and group at startup.
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if args.seed {
        config.seed_demo_data = true;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "config-registry starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_in_flight = config.listener.max_in_flight,
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit = config.rate_limit.enabled,
        idempotency = config.idempotency.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = build_registry(&config)?;

    // The watcher handle has to outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let tls = config.listener.tls.clone();
    let addr = bind_address(&config)?;
    let server = HttpServer::with_registry(config, registry);

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        shutdown.trigger();
    });

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(addr, rustls, config_updates, server_shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, config_updates, server_shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
