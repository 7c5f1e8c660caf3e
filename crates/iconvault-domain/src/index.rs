use std::collections::{BTreeMap, HashMap};

use crate::feeds::{Manifest, VersionDiff};
use crate::key::image_stem;
use crate::versions::DEFAULT_VERSION;

/// Merge the base manifest and the per-version change feeds into the
/// item-key to version mapping.
///
/// `versions` is the fixed release list, newest first. Feeds absent from
/// `diffs` (unreachable or malformed upstream) are skipped; their items fall
/// back to whatever other feeds say, or to the default version.
///
/// The walk runs oldest to newest, pushing each mentioning version to the
/// front of the item's candidate list, so the head of every list ends up
/// being the newest version that touched the item. Items with no mentions
/// map to the newest known version.
pub fn build_index(
    manifest: &Manifest,
    versions: &[String],
    diffs: &HashMap<String, VersionDiff>,
) -> BTreeMap<String, String> {
    let default = versions
        .first()
        .map_or(DEFAULT_VERSION, String::as_str);

    let mut candidates: HashMap<String, Vec<&str>> = manifest
        .images
        .iter()
        .map(|image| (image_stem(image), Vec::new()))
        .collect();

    for version in versions.iter().rev() {
        let Some(diff) = diffs.get(version) else {
            continue;
        };
        for image in diff.touched() {
            candidates
                .entry(image_stem(image))
                .or_default()
                .insert(0, version.as_str());
        }
    }

    candidates
        .into_iter()
        .map(|(key, mentions)| {
            let version = mentions.first().copied().unwrap_or(default);
            (key, version.to_string())
        })
        .collect()
}
