//! Entity model for configs and config groups.
//!
//! # Data Flow
//! ```text
//! client JSON
//!     → config.rs / group.rs (serde types)
//!     → store (immutable snapshots keyed by name + version)
//!     → labels.rs (label queries over group entries)
//! ```
//!
//! # Design Decisions
//! - Entities are plain values; stores hand out clones, never references
//! - `(name, version)` is the identity and is never rewritten
//! - Duplicate parameter keys, label keys and entry names are permitted

pub mod config;
pub mod group;
pub mod labels;

pub use config::{Config, Parameter};
pub use group::{ConfigGroup, GroupEntry, Label};
pub use labels::LabelQuery;

/// An entity addressable by `(name, version)`.
pub trait Versioned {
    /// Human readable kind used in error messages.
    const KIND: &'static str;

    fn name(&self) -> &str;

    fn version(&self) -> u64;
}
