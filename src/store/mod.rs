//! In-memory storage for configs and config groups.
//!
//! # Design Decisions
//! - One coarse mutex per store; operations are short map edits
//! - Values are handed out as clones so callers cannot touch stored snapshots
//! - Stores are constructed explicitly and injected, never global

pub mod memory;

pub use memory::InMemoryStore;

use crate::model::{Config, ConfigGroup};

/// Store of standalone configs.
pub type ConfigStore = InMemoryStore<Config>;

/// Store of config groups.
pub type GroupStore = InMemoryStore<ConfigGroup>;
