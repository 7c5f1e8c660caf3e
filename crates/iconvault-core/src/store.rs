use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;

use iconvault_domain::{normalize_item_id, CacheDocument};

use crate::config::CacheLayout;

/// Persistent index plus lazy path resolution over the extracted version
/// directories.
///
/// Resolution never touches the network; callers wanting a fresh answer go
/// through the sync orchestrator first. The path memo is process-lifetime
/// and never invalidated — entries are verified to exist at insertion time
/// and may go stale if the directories change underneath.
pub struct CacheStore {
    cache_file: PathBuf,
    versions_dir: PathBuf,
    index: BTreeMap<String, String>,
    marker: String,
    memo: Mutex<HashMap<(String, String), PathBuf>>,
}

impl CacheStore {
    pub fn new(layout: &CacheLayout) -> Self {
        Self {
            cache_file: layout.cache_file(),
            versions_dir: layout.versions_dir(),
            index: BTreeMap::new(),
            marker: String::new(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Load the persisted document if present and well-formed. A missing or
    /// malformed file reports `false` so the caller can schedule a rebuild;
    /// it is never an error.
    pub fn load(&mut self) -> bool {
        let raw = match fs::read_to_string(&self.cache_file) {
            Ok(raw) => raw,
            Err(_) => return false,
        };
        match CacheDocument::parse(&raw) {
            Some(document) => {
                self.index = document.index;
                self.marker = document.version;
                true
            }
            None => {
                tracing::warn!(
                    path = %self.cache_file.display(),
                    "discarding malformed cache document"
                );
                false
            }
        }
    }

    /// Atomically persist the current index and marker.
    pub fn save(&self) -> Result<()> {
        let document = CacheDocument {
            version: self.marker.clone(),
            index: self.index.clone(),
        };
        let payload = document.to_json().context("serializing cache document")?;
        let parent = self
            .cache_file
            .parent()
            .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf);
        fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        let mut tmp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("failed to create temp file under {}", parent.display()))?;
        tmp.write_all(payload.as_bytes())
            .context("writing cache document")?;
        tmp.persist(&self.cache_file)
            .map_err(|err| anyhow!("unable to persist cache document: {err}"))?;
        Ok(())
    }

    pub fn set_index(&mut self, index: BTreeMap<String, String>) {
        self.index = index;
    }

    pub fn set_marker(&mut self, marker: String) {
        self.marker = marker;
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Index keys, for bulk operations over everything known.
    pub fn keys(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    /// Map an item id to the cached file that currently represents it.
    ///
    /// `None` is the normal "no icon available" answer: the item is unknown,
    /// its version directory was never fetched, or no matching file exists.
    pub fn resolve(&self, item_id: &str) -> Option<PathBuf> {
        let key = normalize_item_id(item_id);
        let version = self.index.get(&key)?.clone();

        let memo_key = (version.clone(), key.clone());
        {
            let memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(path) = memo.get(&memo_key) {
                return Some(path.clone());
            }
        }

        let file_name = format!("{key}.png");
        let found = find_file(&self.versions_dir.join(&version), &file_name)?;
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        memo.insert(memo_key, found.clone());
        Some(found)
    }
}

/// Recursive scan for an exact file name; archives nest their contents
/// arbitrarily. First match wins.
fn find_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if entry.file_name().to_str() == Some(file_name) {
                return Some(entry.path());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_at(root: &Path) -> CacheStore {
        CacheStore::new(&CacheLayout::new(root))
    }

    fn index_of(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn save_then_load_round_trips_in_a_fresh_instance() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = store_at(temp.path());
        store.set_index(index_of(&[("apple", "1.17.1"), ("sword", "1.21.10")]));
        store.set_marker("2024-06-01".to_string());
        store.save()?;

        let mut reloaded = store_at(temp.path());
        assert!(reloaded.load());
        assert_eq!(reloaded.marker(), "2024-06-01");
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.index.get("apple").map(String::as_str),
            Some("1.17.1")
        );
        Ok(())
    }

    #[test]
    fn malformed_cache_file_loads_as_absent() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = store_at(temp.path());
        fs::write(temp.path().join(crate::config::CACHE_FILE_NAME), "{{nope")?;
        assert!(!store.load());
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn missing_cache_file_loads_as_absent() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = store_at(temp.path());
        assert!(!store.load());
        Ok(())
    }

    #[test]
    fn resolve_finds_nested_files_and_memoizes() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = store_at(temp.path());
        store.set_index(index_of(&[("apple", "1.17.1")]));

        let nested = temp.path().join("versions/1.17.1/textures/items");
        fs::create_dir_all(&nested)?;
        fs::write(nested.join("apple.png"), b"apple-bytes")?;

        let first = store.resolve("minecraft:Apple").expect("resolved");
        assert_eq!(first, nested.join("apple.png"));

        // Memo hit: the answer survives the file moving underneath.
        fs::remove_file(nested.join("apple.png"))?;
        let second = store.resolve("apple").expect("memoized");
        assert_eq!(second, first);
        Ok(())
    }

    #[test]
    fn resolve_misses_are_not_errors() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = store_at(temp.path());
        store.set_index(index_of(&[("ghost", "1.13.2")]));

        // Unknown item: no index entry.
        assert!(store.resolve("unknown").is_none());
        // Known item, version directory never fetched.
        assert!(store.resolve("ghost").is_none());
        // Known item, directory exists but holds no matching file.
        fs::create_dir_all(temp.path().join("versions/1.13.2"))?;
        assert!(store.resolve("ghost").is_none());
        Ok(())
    }
}
