//! Standalone versioned configs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Versioned;

/// A single `key=value` setting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// True when either side is empty.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() || self.value.is_empty()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A named, versioned list of parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub name: String,
    pub version: u64,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Config {
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
            parameters: Vec::new(),
        }
    }

    /// Append a parameter. Existing keys are not replaced.
    pub fn add_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.push(Parameter::new(key, value));
    }

    /// Value of the first parameter with `key`.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

impl Versioned for Config {
    const KIND: &'static str = "config";

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }
}
