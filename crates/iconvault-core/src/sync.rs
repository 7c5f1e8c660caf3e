use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use iconvault_domain::{
    build_index, normalize_item_id, Manifest, VersionDiff, VersionMarker, KNOWN_VERSIONS,
};

use crate::config::{resolve_cache_root, CacheLayout, RemoteEndpoints};
use crate::fetch::fetch_archive;
use crate::net::{get_json_lenient, http_client, DIFF_TIMEOUT, HTTP_TIMEOUT};
use crate::store::CacheStore;
use crate::ui::{aux_asset_path, lookup_aux_asset, sync_aux_assets, AUX_ASSETS};

/// Fixed width of the archive download pool.
pub const DOWNLOAD_WIDTH: usize = 4;

/// Outcome report of one full mirror synchronization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub requested: usize,
    pub fetched: usize,
    pub failed: usize,
    pub bytes_fetched: u64,
    pub items_indexed: usize,
    pub errors: Vec<String>,
}

/// Result of copying cached assets out to a target directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub exported: usize,
    pub missed: usize,
    pub ui_copied: usize,
}

/// Local mirror of the versioned icon gallery.
///
/// One value owns one on-disk cache root; instances over different roots are
/// independent. Mutating operations take `&mut self`, so a full sync can
/// never race resolution on the same instance.
pub struct AssetCache {
    client: reqwest::Client,
    endpoints: RemoteEndpoints,
    layout: CacheLayout,
    store: CacheStore,
    versions: Vec<String>,
    ready: bool,
}

impl AssetCache {
    /// Cache rooted at the given directory, mirroring the public gallery.
    pub fn new(cache_root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_endpoints(cache_root, RemoteEndpoints::default())
    }

    /// Cache at the platform default location (honoring the
    /// `ICONVAULT_CACHE_PATH` override).
    pub fn at_default_location() -> Result<Self> {
        let location = resolve_cache_root()?;
        info!(
            source = location.source,
            path = %location.path.display(),
            "using default cache location"
        );
        Self::new(location.path)
    }

    pub fn with_endpoints(
        cache_root: impl Into<PathBuf>,
        endpoints: RemoteEndpoints,
    ) -> Result<Self> {
        let layout = CacheLayout::new(cache_root);
        // Best effort: a read-only install can still resolve out of an
        // existing cache, so directory creation failures are not fatal here.
        for dir in [layout.ui_dir(), layout.versions_dir()] {
            if let Err(err) = fs::create_dir_all(&dir) {
                warn!(%err, dir = %dir.display(), "cache directory creation failed");
            }
        }
        let store = CacheStore::new(&layout);
        Ok(Self {
            client: http_client()?,
            endpoints,
            layout,
            store,
            versions: KNOWN_VERSIONS.iter().map(|v| (*v).to_string()).collect(),
            ready: false,
        })
    }

    /// Restrict the mirror to a subset of the known releases.
    #[must_use]
    pub fn with_versions(mut self, versions: Vec<String>) -> Self {
        self.versions = versions;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Bring the local mirror up to date if the remote marker moved.
    ///
    /// Loads the persisted index, refreshes the fixed auxiliary assets, then
    /// checks the remote marker. A matching marker over a populated versions
    /// root means no further work; a mismatch, an unreachable marker, or a
    /// missing/empty local cache triggers a full sync. Marker-check failures
    /// are treated as "assume stale", never as errors.
    pub async fn ensure_fresh(&mut self) -> Result<()> {
        info!(root = %self.layout.root().display(), "initializing asset cache");
        let mut needs_rebuild = !self.store.load();

        sync_aux_assets(&self.client, &self.endpoints, &self.layout).await;

        match get_json_lenient::<VersionMarker>(
            &self.client,
            &self.endpoints.marker_url,
            HTTP_TIMEOUT,
        )
        .await
        {
            Some(marker) => {
                if marker.message != self.store.marker() {
                    self.store.set_marker(marker.message);
                    needs_rebuild = true;
                } else if !dir_is_populated(&self.layout.versions_dir()) {
                    needs_rebuild = true;
                }
            }
            None => {
                warn!("update check failed; assuming stale");
                needs_rebuild = true;
            }
        }

        if needs_rebuild {
            self.full_sync().await?;
        } else {
            self.ready = true;
        }
        Ok(())
    }

    /// Rebuild the whole mirror: wipe and re-download every version archive
    /// under the bounded pool, recompute the index from the remote feeds,
    /// and persist the result.
    ///
    /// Individual version failures are collected in the summary and never
    /// abort the sync; only local filesystem problems are errors.
    pub async fn full_sync(&mut self) -> Result<SyncSummary> {
        info!("starting full mirror synchronization");
        let versions_dir = self.layout.versions_dir();
        match fs::remove_dir_all(&versions_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to clear {}", versions_dir.display()));
            }
        }
        fs::create_dir_all(&versions_dir)
            .with_context(|| format!("failed to create {}", versions_dir.display()))?;

        let mut summary = SyncSummary {
            requested: self.versions.len(),
            ..SyncSummary::default()
        };

        let client = self.client.clone();
        let endpoints = self.endpoints.clone();
        let outcomes = join_all_bounded(self.versions.clone(), DOWNLOAD_WIDTH, move |version| {
            let client = client.clone();
            let url = endpoints.archive_url(&version);
            let dest = versions_dir.join(&version);
            async move {
                info!(version = %version, "downloading archive");
                match fetch_archive(&client, &url, &dest).await {
                    Ok(bytes) => {
                        info!(version = %version, bytes, "archive extracted");
                        (version, Ok(bytes))
                    }
                    Err(err) => {
                        warn!(%err, version = %version, "version archive sync failed");
                        (version, Err(format!("{err:#}")))
                    }
                }
            }
        })
        .await;

        for (version, result) in outcomes {
            match result {
                Ok(bytes) => {
                    summary.fetched += 1;
                    summary.bytes_fetched += bytes;
                }
                Err(err) => {
                    summary.failed += 1;
                    summary.errors.push(format!("{version}: {err}"));
                }
            }
        }

        let index = self.build_index_from_remote().await;
        summary.items_indexed = index.len();
        self.store.set_index(index);
        self.store.save()?;
        self.ready = true;
        info!(
            items = summary.items_indexed,
            fetched = summary.fetched,
            failed = summary.failed,
            bytes = summary.bytes_fetched,
            "mirror ready"
        );
        Ok(summary)
    }

    /// Recompute the item-key to version mapping from the base manifest and
    /// the per-version change feeds. Unreachable or malformed feeds are
    /// skipped; affected items degrade to the default version.
    async fn build_index_from_remote(&self) -> BTreeMap<String, String> {
        info!("rebuilding item index from remote feeds");
        let manifest = get_json_lenient::<Manifest>(
            &self.client,
            &self.endpoints.manifest_url(),
            HTTP_TIMEOUT,
        )
        .await
        .unwrap_or_default();

        let mut diffs = HashMap::new();
        for version in &self.versions {
            let url = self.endpoints.changes_url(version);
            if let Some(diff) = get_json_lenient::<VersionDiff>(&self.client, &url, DIFF_TIMEOUT).await
            {
                diffs.insert(version.clone(), diff);
            }
        }
        build_index(&manifest, &self.versions, &diffs)
    }

    /// Resolve an item id to its cached icon file, syncing first if this
    /// cache has not reached readiness yet.
    pub async fn resolve(&mut self, item_id: &str) -> Result<Option<PathBuf>> {
        if !self.ready {
            self.ensure_fresh().await?;
        }
        Ok(self.store.resolve(item_id))
    }

    /// Resolve a batch of item ids. The returned list is parallel to the
    /// input; at most one shared freshness check is performed.
    pub async fn resolve_many<S: AsRef<str>>(
        &mut self,
        item_ids: &[S],
    ) -> Result<Vec<Option<PathBuf>>> {
        if !self.ready {
            self.ensure_fresh().await?;
        }
        Ok(item_ids
            .iter()
            .map(|id| self.store.resolve(id.as_ref()))
            .collect())
    }

    /// Resolve an item id and read the icon bytes. A file that disappeared
    /// underneath the memo degrades to "no icon available".
    pub async fn icon_bytes(&mut self, item_id: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.resolve(item_id).await? else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) => {
                warn!(%err, path = %path.display(), "cached icon unreadable");
                Ok(None)
            }
        }
    }

    /// Locate a fixed auxiliary asset by name.
    pub fn ui_asset(&self, name: &str) -> Option<PathBuf> {
        lookup_aux_asset(&self.layout, name)
    }

    /// Copy cached icons (and optionally the auxiliary assets) into a
    /// target directory. With `item_ids` unset, every indexed item is
    /// exported. Items without a cached file are counted, not errors.
    pub async fn export_icons<S: AsRef<str>>(
        &mut self,
        target: &Path,
        item_ids: Option<&[S]>,
        include_ui: bool,
    ) -> Result<ExportSummary> {
        if !self.ready {
            self.ensure_fresh().await?;
        }
        fs::create_dir_all(target)
            .with_context(|| format!("failed to create {}", target.display()))?;

        let mut summary = ExportSummary::default();
        if include_ui {
            let ui_target = target.join("ui");
            fs::create_dir_all(&ui_target)
                .with_context(|| format!("failed to create {}", ui_target.display()))?;
            for asset in &AUX_ASSETS {
                let src = aux_asset_path(&self.layout, asset);
                if !src.exists() {
                    continue;
                }
                let dest = if asset.in_ui_dir {
                    ui_target.join(asset.name)
                } else {
                    target.join(asset.name)
                };
                match fs::copy(&src, &dest) {
                    Ok(_) => summary.ui_copied += 1,
                    Err(err) => warn!(%err, name = asset.name, "auxiliary asset export failed"),
                }
            }
        }

        let ids: Vec<String> = match item_ids {
            Some(ids) => ids.iter().map(|id| id.as_ref().to_string()).collect(),
            None => self.store.keys(),
        };
        for id in ids {
            let Some(src) = self.store.resolve(&id) else {
                summary.missed += 1;
                continue;
            };
            let key = normalize_item_id(&id);
            match fs::copy(&src, target.join(format!("{key}.png"))) {
                Ok(_) => summary.exported += 1,
                Err(err) => {
                    warn!(%err, item = %id, "icon export failed");
                    summary.missed += 1;
                }
            }
        }
        Ok(summary)
    }
}

fn dir_is_populated(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

/// Run `op` over every item with at most `width` futures in flight, waiting
/// for every outcome. Failures never cancel siblings; a panicked task is
/// logged and dropped from the results.
pub(crate) async fn join_all_bounded<T, F, Fut>(items: Vec<T>, width: usize, op: F) -> Vec<Fut::Output>
where
    F: Fn(T) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let task = op(item);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            task.await
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => warn!(%err, "download task aborted"),
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn bounded_join_never_exceeds_the_pool_width() {
        let width = 4;
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        // Each wave of `width` tasks meets at the barrier, guaranteeing the
        // pool actually fills before any member finishes.
        let barrier = Arc::new(Barrier::new(width));

        let in_flight_op = Arc::clone(&in_flight);
        let peak_op = Arc::clone(&peak);
        let barrier_op = Arc::clone(&barrier);
        let outcomes = join_all_bounded((0..12_usize).collect(), width, move |i: usize| {
            let in_flight = Arc::clone(&in_flight_op);
            let peak = Arc::clone(&peak_op);
            let barrier = Arc::clone(&barrier_op);
            async move {
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(current, Ordering::SeqCst);
                barrier.wait().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        })
        .await;

        assert_eq!(outcomes.len(), 12);
        assert_eq!(peak.load(Ordering::SeqCst), width);
    }

    #[tokio::test]
    async fn bounded_join_preserves_input_order() {
        let outcomes = join_all_bounded(vec![1_u64, 2, 3], 2, |n| async move { n * 10 }).await;
        assert_eq!(outcomes, vec![10, 20, 30]);
    }

    #[test]
    fn default_version_list_matches_the_known_releases() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = AssetCache::new(temp.path()).expect("cache");
        assert_eq!(cache.versions.len(), KNOWN_VERSIONS.len());
        assert!(!cache.is_ready());
    }
}
