/// Normalize a manifest or change-feed image name to an index key.
///
/// Strips one trailing `.png` suffix and lower-cases. Differently-cased
/// entries collapse to a single key.
pub fn image_stem(name: &str) -> String {
    name.strip_suffix(".png")
        .unwrap_or(name)
        .to_ascii_lowercase()
}

/// Normalize a caller-supplied item id to an index key.
///
/// Takes the segment after the last `:` (dropping a `namespace:` prefix),
/// then applies the same suffix and case normalization as [`image_stem`].
pub fn normalize_item_id(item_id: &str) -> String {
    let bare = item_id.rsplit(':').next().unwrap_or(item_id);
    image_stem(bare)
}
