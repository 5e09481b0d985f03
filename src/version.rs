//! format_version parsing and comparison
//!
//! Bedrock documents carry versions like `1.19.0`, `1.20` or `1.16.100.2`.
//! These are not strict semver: the number of components varies, so versions
//! are compared component-wise with missing trailing components read as 0.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SchemaError};

/// A parsed `format_version` value
#[derive(Debug, Clone)]
pub struct FormatVersion {
    components: Vec<u64>,
}

impl FormatVersion {
    /// Create from explicit components
    pub fn new(components: Vec<u64>) -> Self {
        Self { components }
    }

    /// Parse a version string
    ///
    /// Accepts an optional leading `v`. Every dot-separated component must be
    /// a non-negative integer.
    pub fn parse(version_str: &str) -> Result<Self> {
        let trimmed = version_str.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(SchemaError::InvalidVersion(version_str.to_string()));
        }

        let components = trimmed
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| SchemaError::InvalidVersion(version_str.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { components })
    }

    /// The numeric components as written
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Component at `index`, 0 when the version is shorter
    pub fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }

    fn significant(&self) -> &[u64] {
        let len = self
            .components
            .iter()
            .rposition(|c| *c != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.components[..len]
    }
}

/// Compare two version strings
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    Ok(FormatVersion::parse(a)?.cmp(&FormatVersion::parse(b)?))
}

impl FromStr for FormatVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl PartialEq for FormatVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FormatVersion {}

impl Hash for FormatVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl PartialOrd for FormatVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FormatVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl Serialize for FormatVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FormatVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
