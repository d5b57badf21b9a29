use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Exact name of the manifest entry embedded in every archive.
pub const CHECKSUM_ENTRY_NAME: &str = ".checksums";

/// The embedded checksum manifest: entry name → SHA-256 hex digest.
///
/// Serialized as a plain JSON object. The `BTreeMap` keeps key order
/// deterministic, so identical content always produces identical manifest
/// bytes. The manifest covers every non-directory entry other than itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChecksumManifest {
    entries: BTreeMap<String, String>,
}

impl ChecksumManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rel_path: impl Into<String>, hash: impl Into<String>) {
        self.entries.insert(rel_path.into(), hash.into());
    }

    pub fn get(&self, rel_path: &str) -> Option<&str> {
        self.entries.get(rel_path).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json_bytes(&self) -> Vec<u8> {
        // A map of strings cannot fail to serialize.
        serde_json::to_vec_pretty(self).expect("manifest serialization")
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
