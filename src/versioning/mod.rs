//! Copy-on-write versioning of config groups.
//!
//! # Data Flow
//! ```text
//! (group, base version) + delta
//!     → engine.rs loads base snapshot from the group store
//!     → builds a new snapshot at base + 1 (append / drop by name / drop by labels)
//!     → GroupStore::add (fails if base + 1 already exists)
//! ```
//!
//! # Design Decisions
//! - A stored version is never rewritten; every change yields a new version
//! - A failed operation persists nothing
//! - Reads (filter, entry lookup) never create versions

pub mod engine;

pub use engine::VersioningEngine;
