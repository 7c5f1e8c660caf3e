/// Known gallery releases, newest first. The gallery publishes one archive
/// and one change feed per release; later list positions are older releases.
pub const KNOWN_VERSIONS: [&str; 12] = [
    "1.21.10", "1.21.6", "1.21.5", "1.21.4", "1.20.6", "1.19.4", "1.18.2", "1.17.1", "1.16.5",
    "1.15.2", "1.14.4", "1.13.2",
];

/// Release assigned to manifest items that no change feed ever mentions.
pub const DEFAULT_VERSION: &str = KNOWN_VERSIONS[0];
