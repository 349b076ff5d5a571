//! Request concurrency limits.
//!
//! # Design Decisions
//! - A semaphore bounds requests processed at once
//! - Excess requests wait for a slot (backpressure) rather than failing

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::http::response::error_response;

/// Bound on concurrently processed requests.
#[derive(Clone)]
pub struct InFlightLimit {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl InFlightLimit {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

/// Hold a slot for the duration of the request.
pub async fn in_flight_middleware(
    State(limit): State<InFlightLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let _permit = match limit.permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "server is shutting down");
        }
    };
    tracing::trace!(available = limit.available(), "Request slot acquired");
    next.run(request).await
}
