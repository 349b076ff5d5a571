//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, limits, admission control)
//! - Bind server to listener (plain or TLS)
//! - Run background sweeps and apply hot-reloaded limits
//! - Drain on shutdown

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RegistryConfig;
use crate::http::handlers::*;
use crate::http::request::{request_id_header, request_id_of, MakeRequestUuidV4};
use crate::observability::metrics;
use crate::registry::Registry;
use crate::security::idempotency::{idempotency_middleware, IdempotencyCache};
use crate::security::limits::{in_flight_middleware, InFlightLimit};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub rate_limiter: Arc<RateLimiter>,
    pub idempotency: IdempotencyCache,
    pub in_flight: InFlightLimit,
}

/// HTTP server for the registry.
pub struct HttpServer {
    router: Router,
    config: RegistryConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server over an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_registry(config, Registry::new())
    }

    /// Create a server over an existing registry.
    pub fn with_registry(config: RegistryConfig, registry: Registry) -> Self {
        let state = AppState {
            registry,
            rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            idempotency: IdempotencyCache::new(config.idempotency.ttl()),
            in_flight: InFlightLimit::new(config.listener.max_in_flight),
        };
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RegistryConfig, state: AppState) -> Router {
        let mut api = Router::new()
            .route("/configs", get(list_configs).post(create_config))
            .route("/configs/{name}/{version}", get(get_config).delete(delete_config))
            .route("/groups", get(list_groups).post(create_group))
            .route("/groups/{name}", get(list_group_versions))
            .route("/groups/{name}/{version}", get(get_group).delete(delete_group))
            .route(
                "/groups/{name}/{version}/configs",
                get(filter_group_entries)
                    .post(add_group_entry)
                    .delete(remove_group_entries_by_labels),
            )
            .route(
                "/groups/{name}/{version}/configs/{config}",
                get(get_group_entry).delete(remove_group_entry),
            )
            .with_state(state.clone());

        // Rate limiting runs before the idempotency cache.
        if config.idempotency.enabled {
            api = api.layer(middleware::from_fn_with_state(
                state.idempotency.clone(),
                idempotency_middleware,
            ));
        }
        if config.rate_limit.enabled {
            api = api.layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            ));
        }

        // Outermost first.
        let stack = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuidV4))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Router::new()
            .route("/health", get(health))
            .merge(api)
            .layer(middleware::from_fn_with_state(state.in_flight.clone(), in_flight_middleware))
            .layer(middleware::from_fn(track_metrics))
            .layer(stack)
    }

    /// Router with the full middleware stack, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<RegistryConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_background(config_updates, &shutdown);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<RegistryConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_background(config_updates, &shutdown);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        let grace = Duration::from_secs(self.config.timeouts.request_secs);
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            drain.graceful_shutdown(Some(grace));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    fn spawn_background(
        &self,
        config_updates: mpsc::UnboundedReceiver<RegistryConfig>,
        shutdown: &broadcast::Receiver<()>,
    ) {
        tokio::spawn(sweep_loop(
            self.state.clone(),
            self.config.clone(),
            shutdown.resubscribe(),
        ));
        tokio::spawn(apply_config_updates(
            self.state.rate_limiter.clone(),
            self.config.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));
    }
}

/// Record request count and latency.
async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let request_id = request_id_of(&request).unwrap_or_default().to_string();
    let response = next.run(request).await;
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "Request completed"
    );
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

/// Periodically evict idle rate-limit buckets and expired idempotency entries.
async fn sweep_loop(
    state: AppState,
    config: RegistryConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(config.idempotency.sweep_interval());
    ticker.tick().await;
    let idle = config.rate_limit.idle_eviction();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let buckets = state.rate_limiter.evict_idle(idle);
                let replies = state.idempotency.sweep_expired();
                if buckets > 0 || replies > 0 {
                    tracing::debug!(
                        evicted_buckets = buckets,
                        expired_replies = replies,
                        "Admission tables swept"
                    );
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Apply reloaded configuration. Only rate limits change live.
async fn apply_config_updates(
    limiter: Arc<RateLimiter>,
    mut current: RegistryConfig,
    mut updates: mpsc::UnboundedReceiver<RegistryConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            Some(next) = updates.recv() => {
                let limits = &next.rate_limit;
                limiter.reconfigure(limits.requests_per_second, limits.burst_size);

                let mut pending = next.clone();
                pending.rate_limit.requests_per_second = current.rate_limit.requests_per_second;
                pending.rate_limit.burst_size = current.rate_limit.burst_size;
                if pending != current {
                    tracing::warn!("Config changes outside rate limits take effect after restart");
                }
                current = next;
            }
            _ = shutdown.recv() => break,
        }
    }
}
