//! Config groups and their entries.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Parameter, Versioned};

/// Metadata tag attached to a group entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty() || self.value.is_empty()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

/// A config bundle nested inside a group.
///
/// Entries have no identity of their own; two entries in one group may share
/// a name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GroupEntry {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl GroupEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn add_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.push(Parameter::new(key, value));
    }

    pub fn add_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.labels.push(Label::new(key, value));
    }

    /// Builder form of [`GroupEntry::add_label`].
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_label(key, value);
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.key == key)
            .map(|l| l.value.as_str())
    }
}

/// A versioned, ordered collection of group entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigGroup {
    pub name: String,
    pub version: u64,
    #[serde(default, rename = "configs")]
    pub entries: Vec<GroupEntry>,
}

impl ConfigGroup {
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
            entries: Vec::new(),
        }
    }

    /// Append an entry. Only used while assembling a group that has not been
    /// stored yet; stored groups change through the versioning engine.
    pub fn push_entry(&mut self, entry: GroupEntry) {
        self.entries.push(entry);
    }

    /// First entry named `name`.
    pub fn entry(&self, name: &str) -> Option<&GroupEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl Versioned for ConfigGroup {
    const KIND: &'static str = "config group";

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }
}
