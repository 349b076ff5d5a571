//! Composition root for the stores and the versioning engine.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{Config, ConfigGroup, GroupEntry};
use crate::store::{ConfigStore, GroupStore};
use crate::versioning::VersioningEngine;

/// Owns the config store, the group store and an engine bound to the latter.
#[derive(Clone)]
pub struct Registry {
    pub configs: Arc<ConfigStore>,
    pub groups: Arc<GroupStore>,
    pub engine: VersioningEngine,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        let groups = Arc::new(GroupStore::new());
        Self {
            configs: Arc::new(ConfigStore::new()),
            engine: VersioningEngine::new(groups.clone()),
            groups,
        }
    }

    /// Registry pre-filled with a demo config and group.
    pub fn seeded() -> Result<Self> {
        let registry = Self::new();

        let mut config = Config::new("db_config", 2);
        config.add_parameter("username", "pera");
        config.add_parameter("port", "5432");
        config.add_parameter("host", "localhost");
        registry.configs.add(config)?;

        let mut web = GroupEntry::new("web_server");
        web.add_parameter("port", "8080");
        web.add_parameter("host", "0.0.0.0");
        web.add_label("environment", "development");
        web.add_label("team", "backend");

        let mut group = ConfigGroup::new("web_configs", 1);
        group.push_entry(web);
        registry.groups.add(group)?;

        tracing::info!(
            configs = registry.configs.len(),
            groups = registry.groups.len(),
            "Registry seeded with demo data"
        );
        Ok(registry)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_shares_group_store() {
        let registry = Registry::seeded().unwrap();
        let next = registry
            .engine
            .create_with_entry("web_configs", 1, GroupEntry::new("cache"))
            .unwrap();

        assert_eq!(registry.groups.get("web_configs", 2).unwrap(), next);
        assert_eq!(registry.configs.get("db_config", 2).unwrap().parameter("port"), Some("5432"));
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = Registry::new();
        let b = Registry::new();
        a.configs.add(Config::new("only_in_a", 1)).unwrap();
        assert!(b.configs.is_empty());
    }
}
