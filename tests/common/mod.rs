//! Shared utilities for integration tests.

use config_registry::config::RegistryConfig;
use config_registry::http::HttpServer;
use config_registry::lifecycle::{build_registry, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A registry server running on an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<RegistryConfig>,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    /// Trigger shutdown and wait for the server to drain.
    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

/// Test defaults: seeded, generous rate limits.
pub fn test_config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.seed_demo_data = true;
    config.rate_limit.burst_size = 10_000;
    config.rate_limit.requests_per_second = 10_000.0;
    config
}

pub async fn start_server(config: RegistryConfig) -> TestServer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let registry = build_registry(&config).unwrap();
    let server = HttpServer::with_registry(config, registry);
    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(server.run(listener, updates_rx, shutdown.subscribe()));

    TestServer {
        base_url: format!("http://{}", addr),
        shutdown,
        config_updates,
        handle,
    }
}
