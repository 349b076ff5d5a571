//! Per-client token bucket rate limiting.

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::{RegistryError, Result};
use crate::observability::metrics;
use crate::security::client_ip;

/// Advisory delay returned with a rejection unless configured otherwise.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Refill rate and burst capacity shared by every bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketSettings {
    /// Tokens added per second.
    pub refill_rate: f64,
    /// Maximum tokens a bucket can hold.
    pub capacity: f64,
}

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, settings: BucketSettings, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * settings.refill_rate).min(settings.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, settings: BucketSettings, now: Instant) -> bool {
        self.refill(settings, now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whether this bucket would be back at capacity by `now`.
    fn is_full_at(&self, settings: BucketSettings, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens + elapsed * settings.refill_rate >= settings.capacity
    }
}

/// Token buckets keyed by client identity.
///
/// Buckets are created on first sight of a client and start full.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    settings: ArcSwap<BucketSettings>,
    retry_after: Duration,
}

impl RateLimiter {
    pub fn new(refill_rate_per_second: f64, burst_capacity: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            settings: ArcSwap::from_pointee(BucketSettings {
                refill_rate: refill_rate_per_second,
                capacity: burst_capacity as f64,
            }),
            retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
            .with_retry_after(config.retry_after())
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Admit one request from `client_id` if it has a token left.
    pub fn allow(&self, client_id: &str) -> bool {
        self.allow_at(client_id, Instant::now())
    }

    fn allow_at(&self, client_id: &str, now: Instant) -> bool {
        let settings = **self.settings.load();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let bucket = buckets
            .entry(client_id.to_string())
            .or_insert_with(|| TokenBucket::new(settings.capacity, now));
        bucket.try_acquire(settings, now)
    }

    /// [`RateLimiter::allow`] as a typed result.
    pub fn check(&self, client_id: &str) -> Result<()> {
        if self.allow(client_id) {
            Ok(())
        } else {
            Err(RegistryError::RateLimited {
                retry_after: self.retry_after,
            })
        }
    }

    /// Fixed advisory delay attached to rejections.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    pub fn settings(&self) -> BucketSettings {
        **self.settings.load()
    }

    /// Swap in new limits. Existing buckets keep their tokens, capped at the
    /// new capacity on their next refill.
    pub fn reconfigure(&self, refill_rate_per_second: f64, burst_capacity: u32) {
        let next = BucketSettings {
            refill_rate: refill_rate_per_second,
            capacity: burst_capacity as f64,
        };
        let previous = self.settings.swap(Arc::new(next));
        if *previous != next {
            tracing::info!(
                refill_rate = next.refill_rate,
                capacity = next.capacity,
                "Rate limits updated"
            );
        }
    }

    /// Drop buckets idle for at least `max_idle` that have refilled to
    /// capacity. A recreated bucket starts full, so admission is unchanged.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(max_idle, Instant::now())
    }

    fn evict_idle_at(&self, max_idle: Duration, now: Instant) -> usize {
        let settings = **self.settings.load();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            now.saturating_duration_since(bucket.last_refill) < max_idle
                || !bucket.is_full_at(settings, now)
        });
        let evicted = before - buckets.len();
        metrics::record_tracked_clients(buckets.len());
        evicted
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").len()
    }
}

/// Reject requests from clients whose bucket is empty.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip::client_id_for(&request);

    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
            metrics::record_rate_limited("token_bucket");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_burst_then_reject() {
        let limiter = RateLimiter::new(1.0, 10);
        let now = Instant::now();

        for i in 0..10 {
            assert!(limiter.allow_at("client", now), "request {} should pass", i);
        }
        assert!(!limiter.allow_at("client", now));
    }

    #[test]
    fn test_refill_admits_exactly_one() {
        let limiter = RateLimiter::new(5.0, 10);
        let start = Instant::now();
        for _ in 0..10 {
            assert!(limiter.allow_at("client", start));
        }
        assert!(!limiter.allow_at("client", start));

        // 250ms at 5 tokens/s refills 1.25 tokens.
        let later = start + Duration::from_millis(250);
        assert!(limiter.allow_at("client", later));
        assert!(!limiter.allow_at("client", later));
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let limiter = RateLimiter::new(100.0, 3);
        let start = Instant::now();
        assert!(limiter.allow_at("c", start));

        let much_later = start + Duration::from_secs(60);
        for _ in 0..3 {
            assert!(limiter.allow_at("c", much_later));
        }
        assert!(!limiter.allow_at("c", much_later));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1.0, 1);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_check_reports_retry_hint() {
        let limiter = RateLimiter::new(1.0, 1).with_retry_after(Duration::from_secs(2));
        assert!(limiter.check("a").is_ok());
        assert_eq!(
            limiter.check("a").unwrap_err(),
            RegistryError::RateLimited {
                retry_after: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn test_reconfigure() {
        let limiter = RateLimiter::new(1.0, 1);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));

        limiter.reconfigure(1000.0, 5);
        assert_eq!(limiter.settings().capacity, 5.0);
        assert!(limiter.allow_at("a", now + Duration::from_millis(10)));
        // New clients start at the new capacity.
        for _ in 0..5 {
            assert!(limiter.allow_at("b", now));
        }
        assert!(!limiter.allow_at("b", now));
    }

    #[test]
    fn test_evict_idle_keeps_draining_buckets() {
        let limiter = RateLimiter::new(1.0, 10);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.allow_at("drained", start);
        }
        limiter.allow_at("light", start);

        // 5s later: "light" is full again, "drained" holds only 5 tokens.
        let evicted = limiter.evict_idle_at(Duration::from_secs(5), start + Duration::from_secs(5));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);

        // A short idle window keeps everything.
        let later = start + Duration::from_secs(5);
        assert_eq!(limiter.evict_idle_at(Duration::from_secs(60), later), 0);
    }

    #[tokio::test]
    async fn test_middleware_rejects_with_429() {
        let limiter = Arc::new(RateLimiter::new(0.001, 2));
        let app = Router::new()
            .route("/configs", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

        let request = || {
            Request::builder()
                .uri("/configs")
                .header(client_ip::X_FORWARDED_FOR, "203.0.113.1")
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..2 {
            let res = app.clone().oneshot(request()).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()["retry-after"], "1");

        // A different forwarded client still has its own burst.
        let other = Request::builder()
            .uri("/configs")
            .header(client_ip::X_FORWARDED_FOR, "203.0.113.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(other).await.unwrap().status(), StatusCode::OK);
    }
}
