//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RegistryConfig (validated, immutable)
//!     → handed to the HTTP server at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server applies admission limits live
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes arrive as whole new values
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    IdempotencyConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig, RegistryConfig,
    SecurityConfig, TimeoutConfig, TlsConfig,
};
