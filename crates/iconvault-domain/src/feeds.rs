use serde::Deserialize;

/// Base gallery manifest: every known image name, with no version attribution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub images: Vec<String>,
}

/// Per-version change feed: image names added or modified in that release.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionDiff {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

impl VersionDiff {
    /// All images the release touched, added first then modified.
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .map(String::as_str)
    }
}

/// Remote freshness marker. The `message` string is opaque and compared
/// byte-for-byte against the locally stored marker.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionMarker {
    #[serde(default)]
    pub message: String,
}
