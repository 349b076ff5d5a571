//! Group versioning engine.

use std::sync::Arc;

use crate::error::{RegistryError, Result};
use crate::model::{ConfigGroup, GroupEntry, LabelQuery, Versioned};
use crate::observability::metrics;
use crate::store::GroupStore;

/// Builds new group versions from existing ones.
#[derive(Clone)]
pub struct VersioningEngine {
    groups: Arc<GroupStore>,
}

impl VersioningEngine {
    pub fn new(groups: Arc<GroupStore>) -> Self {
        Self { groups }
    }

    /// New version holding every base entry followed by `entry`.
    pub fn create_with_entry(
        &self,
        group_name: &str,
        base_version: u64,
        entry: GroupEntry,
    ) -> Result<ConfigGroup> {
        let base = self.groups.get(group_name, base_version)?;
        let mut entries = base.entries;
        entries.push(entry);
        self.persist(group_name, base_version, entries, "add_entry")
    }

    /// New version without the entries named `entry_name`.
    pub fn create_without_entry(
        &self,
        group_name: &str,
        base_version: u64,
        entry_name: &str,
    ) -> Result<ConfigGroup> {
        let base = self.groups.get(group_name, base_version)?;
        let before = base.entries.len();
        let kept: Vec<GroupEntry> = base
            .entries
            .into_iter()
            .filter(|e| e.name != entry_name)
            .collect();

        if kept.len() == before {
            return Err(RegistryError::EntryNotFound {
                group: group_name.to_string(),
                version: base_version,
                entry: entry_name.to_string(),
            });
        }
        self.persist(group_name, base_version, kept, "remove_entry")
    }

    /// New version without the entries matching `label_query`.
    pub fn create_without_entries_by_labels(
        &self,
        group_name: &str,
        base_version: u64,
        label_query: &str,
    ) -> Result<ConfigGroup> {
        let query = LabelQuery::parse(label_query)?;
        let base = self.groups.get(group_name, base_version)?;
        let (dropped, kept): (Vec<GroupEntry>, Vec<GroupEntry>) =
            base.entries.into_iter().partition(|e| query.matches(e));

        if dropped.is_empty() {
            return Err(RegistryError::NoMatch {
                group: group_name.to_string(),
                version: base_version,
                query: label_query.to_string(),
            });
        }
        tracing::debug!(
            group = %group_name,
            base_version,
            dropped = dropped.len(),
            "Removing entries by labels"
        );
        self.persist(group_name, base_version, kept, "remove_by_labels")
    }

    /// Entries of `(group_name, version)` matching `label_query`, in order.
    pub fn filter_by_labels(
        &self,
        group_name: &str,
        version: u64,
        label_query: &str,
    ) -> Result<Vec<GroupEntry>> {
        let query = LabelQuery::parse(label_query)?;
        let group = self.groups.get(group_name, version)?;
        Ok(group
            .entries
            .into_iter()
            .filter(|e| query.matches(e))
            .collect())
    }

    /// First entry named `entry_name` in `(group_name, version)`.
    pub fn entry(&self, group_name: &str, version: u64, entry_name: &str) -> Result<GroupEntry> {
        let group = self.groups.get(group_name, version)?;
        group
            .entries
            .into_iter()
            .find(|e| e.name == entry_name)
            .ok_or_else(|| RegistryError::EntryNotFound {
                group: group_name.to_string(),
                version,
                entry: entry_name.to_string(),
            })
    }

    fn persist(
        &self,
        group_name: &str,
        base_version: u64,
        entries: Vec<GroupEntry>,
        operation: &'static str,
    ) -> Result<ConfigGroup> {
        let version = base_version
            .checked_add(1)
            .ok_or_else(|| RegistryError::Conflict {
                kind: ConfigGroup::KIND,
                name: group_name.to_string(),
                version: base_version,
            })?;

        let group = ConfigGroup {
            name: group_name.to_string(),
            version,
            entries,
        };
        self.groups.add(group.clone())?;

        metrics::record_group_version(operation);
        tracing::info!(
            group = %group_name,
            from = base_version,
            to = version,
            entries = group.entries.len(),
            operation,
            "Group version created"
        );
        Ok(group)
    }
}
