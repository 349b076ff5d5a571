//! Label query parsing and matching.
//!
//! # Responsibilities
//! - Parse `key:value;key:value` queries into a required-label mapping
//! - Match a group entry against that mapping
//!
//! # Design Decisions
//! - Conjunction: every required pair must be present with an exact value
//! - Extra labels on the entry are ignored
//! - Empty query = no filter (matches every entry)
//! - Keys and values are trimmed; the first `:` splits a pair

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{RegistryError, Result};
use crate::model::GroupEntry;

/// Required labels parsed from a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelQuery {
    required: BTreeMap<String, String>,
}

impl LabelQuery {
    /// Parse a `key:value;key:value` query.
    ///
    /// When a key is repeated the last value wins.
    pub fn parse(query: &str) -> Result<Self> {
        let mut required = BTreeMap::new();
        if query.trim().is_empty() {
            return Ok(Self { required });
        }

        for pair in query.split(';') {
            let (key, value) = pair.split_once(':').ok_or_else(|| {
                invalid(query, format!("pair {:?} has no ':' separator", pair.trim()))
            })?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(invalid(query, format!("pair {:?} has an empty side", pair.trim())));
            }
            required.insert(key.to_string(), value.to_string());
        }

        Ok(Self { required })
    }

    /// True when every required pair is present on the entry.
    pub fn matches(&self, entry: &GroupEntry) -> bool {
        matches(entry, &self.required)
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    pub fn len(&self) -> usize {
        self.required.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.required.get(key).map(String::as_str)
    }

    /// The parsed pairs, ordered by key.
    pub fn pairs(&self) -> &BTreeMap<String, String> {
        &self.required
    }
}

impl fmt::Display for LabelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.required.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{}:{}", key, value)?;
        }
        Ok(())
    }
}

impl From<BTreeMap<String, String>> for LabelQuery {
    fn from(required: BTreeMap<String, String>) -> Self {
        Self { required }
    }
}

/// Parse a label query into its required-label mapping.
pub fn parse(query: &str) -> Result<BTreeMap<String, String>> {
    LabelQuery::parse(query).map(|q| q.required)
}

/// Conjunctive match of `required` against the entry's labels.
pub fn matches(entry: &GroupEntry, required: &BTreeMap<String, String>) -> bool {
    required.iter().all(|(key, value)| {
        entry
            .labels
            .iter()
            .any(|label| label.key == *key && label.value == *value)
    })
}

fn invalid(query: &str, reason: String) -> RegistryError {
    RegistryError::InvalidLabelFormat {
        query: query.to_string(),
        reason,
    }
}
