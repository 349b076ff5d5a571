//! Versioned configuration registry library.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod net;
pub mod observability;
pub mod registry;
pub mod security;
pub mod store;
pub mod versioning;

pub use config::schema::RegistryConfig;
pub use error::RegistryError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::Registry;
