//! Transport helpers.
//!
//! Plain TCP is handled by `axum::serve`; this module only prepares the
//! rustls configuration used when `listener.tls` is set.

pub mod tls;

pub use tls::load_tls_config;
