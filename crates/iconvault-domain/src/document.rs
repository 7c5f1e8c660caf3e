use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Persisted cache document: the stored freshness marker plus the item-key
/// to version mapping. This is the only state that survives a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheDocument {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub index: BTreeMap<String, String>,
}

impl CacheDocument {
    /// Parse a persisted document, treating any malformed input as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
