//! Request admission control.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (bound concurrently processed requests)
//!     → client_ip.rs (resolve the client identity)
//!     → rate_limit.rs (per-client token bucket; reject with 429)
//!     → idempotency.rs (POST + Idempotency-Key: replay, reject in-flight duplicate, or reserve)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - Each shared table has its own lock; no cross-table transactions
//! - Rate-limit rejections never wait for tokens; they return immediately
//! - The in-flight limit applies backpressure instead of rejecting
//! - Both admission tables are swept in the background so they stay bounded

pub mod client_ip;
pub mod idempotency;
pub mod limits;
pub mod rate_limit;

pub use idempotency::{CachedResponse, IdempotencyCache, Reservation};
pub use limits::InFlightLimit;
pub use rate_limit::RateLimiter;
