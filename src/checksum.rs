//! Content identity for resolved schemas
//!
//! A compiled validator is reused only while the schema it was compiled from
//! hashes to the same value.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex SHA256 of a schema tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    /// Hash of the compact serialization of `schema`
    ///
    /// Object keys serialize in sorted order, so trees that differ only in
    /// key order hash the same.
    pub fn of_schema(schema: &serde_json::Value) -> Self {
        Self::from_bytes(schema.to_string().as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters, enough to tell entries apart in logs
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a = json!({"type": "object", "properties": {"b": {}, "a": {}}});
        let b = json!({"properties": {"a": {}, "b": {}}, "type": "object"});
        assert_eq!(Checksum::of_schema(&a), Checksum::of_schema(&b));
    }

    #[test]
    fn test_versioned_enum_changes_identity() {
        let base = Checksum::of_schema(&json!({"properties": {"foo": {"type": "string"}}}));
        let patched = Checksum::of_schema(&json!({"properties": {"foo": {"type": "string", "enum": ["a", "b"]}}}));
        assert_ne!(base, patched);
        assert_eq!(base.as_str().len(), 64);
        assert_eq!(base.short().len(), 12);
    }
}
