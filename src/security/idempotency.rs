//! Replay cache for POST requests carrying an `Idempotency-Key`.
//!
//! # Responsibilities
//! - Replay a captured response (status, headers, body) while it is fresh
//! - Reserve a key before the first execution so a racing duplicate sees
//!   "in progress" instead of executing a second time
//! - Expire entries lazily, with a background sweep to bound memory
//!
//! # Key States
//! ```text
//! absent/expired → InFlight   (reserve)
//! InFlight       → Ready      (guard completed with the response)
//! InFlight       → absent     (guard dropped: handler failed or was cancelled)
//! Ready          → expired    (ttl elapsed)
//! ```

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::http::response::error_response;
use crate::observability::metrics;

pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

/// A fully captured response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

enum Slot {
    InFlight { token: u64, expires_at: Instant },
    Ready { response: CachedResponse, expires_at: Instant },
}

impl Slot {
    fn expires_at(&self) -> Instant {
        match self {
            Slot::InFlight { expires_at, .. } | Slot::Ready { expires_at, .. } => *expires_at,
        }
    }
}

/// Outcome of [`IdempotencyCache::reserve`].
pub enum Reservation {
    /// A fresh response exists; send it without executing.
    Replay(CachedResponse),
    /// Another request with this key is executing right now.
    InFlight,
    /// The caller owns the key and must execute, then complete the guard.
    Acquired(ReservationGuard),
}

/// Exclusive claim on a key. Dropping it without completing frees the key.
pub struct ReservationGuard {
    cache: IdempotencyCache,
    key: String,
    token: u64,
    completed: bool,
}

impl ReservationGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Store the captured response under the reserved key.
    pub fn complete(mut self, response: CachedResponse) {
        self.cache.store(&self.key, response);
        self.completed = true;
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if !self.completed {
            let token = self.token;
            self.cache.entries.remove_if(&self.key, |_, slot| {
                matches!(slot, Slot::InFlight { token: t, .. } if *t == token)
            });
            tracing::debug!(key = %self.key, "Idempotency reservation released");
        }
    }
}

/// Shared replay cache. Cloning shares the same table.
#[derive(Clone)]
pub struct IdempotencyCache {
    entries: Arc<DashMap<String, Slot>>,
    next_token: Arc<AtomicU64>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_token: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh captured response for `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<CachedResponse> {
        self.lookup_at(key, Instant::now())
    }

    fn lookup_at(&self, key: &str, now: Instant) -> Option<CachedResponse> {
        match self.entries.get(key).as_deref() {
            Some(Slot::Ready {
                response,
                expires_at,
            }) if *expires_at > now => Some(response.clone()),
            _ => None,
        }
    }

    /// Store `response` under `key` for one TTL, replacing whatever was there.
    pub fn store(&self, key: &str, response: CachedResponse) {
        self.store_at(key, response, Instant::now());
    }

    fn store_at(&self, key: &str, response: CachedResponse, now: Instant) {
        self.entries.insert(
            key.to_string(),
            Slot::Ready {
                response,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Atomically replay, report in-flight, or claim `key`.
    pub fn reserve(&self, key: &str) -> Reservation {
        self.reserve_at(key, Instant::now())
    }

    fn reserve_at(&self, key: &str, now: Instant) -> Reservation {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let placeholder = Slot::InFlight {
            token,
            expires_at: now + self.ttl,
        };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let existing = match occupied.get() {
                    Slot::Ready {
                        response,
                        expires_at,
                    } if *expires_at > now => Some(Reservation::Replay(response.clone())),
                    Slot::InFlight { expires_at, .. } if *expires_at > now => {
                        Some(Reservation::InFlight)
                    }
                    _ => None,
                };
                if let Some(existing) = existing {
                    return existing;
                }
                occupied.insert(placeholder);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(placeholder);
            }
        }

        Reservation::Acquired(ReservationGuard {
            cache: self.clone(),
            key: key.to_string(),
            token,
            completed: false,
        })
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn sweep_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.expires_at() > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Non-empty idempotency key of a POST request.
fn idempotency_key(request: &Request<Body>) -> Option<String> {
    if request.method() != Method::POST {
        return None;
    }
    request
        .headers()
        .get(IDEMPOTENCY_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Replay or capture POST responses keyed by `Idempotency-Key`.
pub async fn idempotency_middleware(
    State(cache): State<IdempotencyCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(key) = idempotency_key(&request) else {
        return next.run(request).await;
    };

    let guard = match cache.reserve(&key) {
        Reservation::Replay(cached) => {
            tracing::debug!(key = %key, status = %cached.status, "Replaying cached response");
            metrics::record_idempotent_replay();
            return cached.into_response();
        }
        Reservation::InFlight => {
            tracing::warn!(key = %key, "Duplicate request while original is in progress");
            metrics::record_idempotency_conflict();
            return error_response(
                StatusCode::CONFLICT,
                "a request with this idempotency key is in progress",
            );
        }
        Reservation::Acquired(guard) => guard,
    };

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(key = %guard.key(), error = %e, "Failed to capture response body");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to capture response");
        }
    };

    guard.complete(CachedResponse {
        status: parts.status,
        headers: parts.headers.clone(),
        body: body.clone(),
    });
    Response::from_parts(parts, Body::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::header,
        middleware,
        routing::{get, post},
        Router,
    };
    use std::sync::atomic::AtomicUsize;
    use tower::ServiceExt;

    fn created(body: &'static str) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert("x-trace", "abc".parse().unwrap());
        CachedResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_lookup_respects_ttl() {
        let cache = IdempotencyCache::new(Duration::from_secs(10));
        let now = Instant::now();
        cache.store_at("k", created("{}"), now);

        assert_eq!(cache.lookup_at("k", now + Duration::from_secs(9)), Some(created("{}")));
        assert_eq!(cache.lookup_at("k", now + Duration::from_secs(10)), None);
        assert_eq!(cache.lookup_at("other", now), None);
    }

    #[test]
    fn test_reserve_states() {
        let cache = IdempotencyCache::new(Duration::from_secs(10));
        let now = Instant::now();

        let guard = match cache.reserve_at("k", now) {
            Reservation::Acquired(guard) => guard,
            _ => panic!("first reservation must acquire"),
        };
        assert!(matches!(cache.reserve_at("k", now), Reservation::InFlight));
        assert!(cache.lookup_at("k", now).is_none());

        guard.complete(created("{\"v\":1}"));
        match cache.reserve("k") {
            Reservation::Replay(response) => assert_eq!(response, created("{\"v\":1}")),
            _ => panic!("completed key must replay"),
        }
    }

    #[test]
    fn test_dropped_guard_frees_key() {
        let cache = IdempotencyCache::new(Duration::from_secs(10));
        match cache.reserve("k") {
            Reservation::Acquired(guard) => drop(guard),
            _ => panic!("expected acquisition"),
        }
        assert!(cache.is_empty());
        assert!(matches!(cache.reserve("k"), Reservation::Acquired(_)));
    }

    #[test]
    fn test_stale_guard_does_not_release_newer_reservation() {
        let cache = IdempotencyCache::new(Duration::from_secs(1));
        let now = Instant::now();
        let stale = match cache.reserve_at("k", now) {
            Reservation::Acquired(guard) => guard,
            _ => panic!("expected acquisition"),
        };

        // Placeholder expired; a new request claims the key.
        let fresh = match cache.reserve_at("k", now + Duration::from_secs(2)) {
            Reservation::Acquired(guard) => guard,
            _ => panic!("expired placeholder must be reclaimable"),
        };
        drop(stale);
        assert_eq!(cache.len(), 1);
        drop(fresh);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_is_overwritten() {
        let cache = IdempotencyCache::new(Duration::from_secs(5));
        let now = Instant::now();
        cache.store_at("k", created("old"), now);

        assert!(matches!(
            cache.reserve_at("k", now + Duration::from_secs(6)),
            Reservation::Acquired(_)
        ));
    }

    #[test]
    fn test_sweep_expired() {
        let cache = IdempotencyCache::new(Duration::from_secs(5));
        let now = Instant::now();
        cache.store_at("old", created("a"), now);
        cache.store_at("new", created("b"), now + Duration::from_secs(4));

        assert_eq!(cache.sweep_expired_at(now + Duration::from_secs(6)), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup_at("new", now + Duration::from_secs(6)).is_some());
    }

    fn counting_app(cache: IdempotencyCache, calls: Arc<AtomicUsize>) -> Router {
        let post_calls = calls.clone();
        Router::new()
            .route(
                "/groups",
                post(move || {
                    let calls = post_calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        (
                            StatusCode::CREATED,
                            [("x-execution", n.to_string())],
                            format!("{{\"execution\":{}}}", n),
                        )
                    }
                }),
            )
            .route(
                "/slow",
                post(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    StatusCode::CREATED
                }),
            )
            .route("/groups/{name}", get(|| async { "read" }))
            .layer(middleware::from_fn_with_state(cache, idempotency_middleware))
    }

    fn post_with_key(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(key) = key {
            builder = builder.header(IDEMPOTENCY_KEY, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn parts(response: Response) -> (StatusCode, HeaderMap, Bytes) {
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        (parts.status, parts.headers, body)
    }

    #[tokio::test]
    async fn test_sequential_replay_then_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = IdempotencyCache::new(Duration::from_millis(150));
        let app = counting_app(cache, calls.clone());

        let send = |app: Router| async move {
            let response = app.oneshot(post_with_key("/groups", Some("abc"))).await.unwrap();
            parts(response).await
        };
        let first = send(app.clone()).await;
        let second = send(app.clone()).await;

        assert_eq!(first, second);
        assert_eq!(first.0, StatusCode::CREATED);
        assert_eq!(first.1["x-execution"], "1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let third = send(app).await;
        assert_eq!(third.1["x-execution"], "2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_requests_without_key_bypass_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let app = counting_app(cache.clone(), calls.clone());

        for _ in 0..2 {
            app.clone().oneshot(post_with_key("/groups", None)).await.unwrap();
            app.clone().oneshot(post_with_key("/groups", Some("  "))).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        // Non-POST methods never participate.
        let get = Request::builder()
            .uri("/groups/web")
            .header(IDEMPOTENCY_KEY, "abc")
            .body(Body::empty())
            .unwrap();
        app.oneshot(get).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_is_rejected() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let app = counting_app(cache, Arc::new(AtomicUsize::new(0)));

        let slow = tokio::spawn(app.clone().oneshot(post_with_key("/slow", Some("race"))));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let duplicate = app.clone().oneshot(post_with_key("/slow", Some("race"))).await.unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let original = slow.await.unwrap().unwrap();
        assert_eq!(original.status(), StatusCode::CREATED);

        let replay = app.oneshot(post_with_key("/slow", Some("race"))).await.unwrap();
        assert_eq!(replay.status(), StatusCode::CREATED);
    }
}
