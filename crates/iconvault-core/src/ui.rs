use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{CacheLayout, RemoteEndpoints};
use crate::net::HTTP_TIMEOUT;

/// Files smaller than this are assumed to be truncated downloads and are
/// fetched again on the next pass.
pub(crate) const MIN_ASSET_BYTES: u64 = 100;

pub(crate) struct AuxAsset {
    pub name: &'static str,
    /// Slot icons live under `ui/`; everything else sits at the cache root.
    pub in_ui_dir: bool,
}

/// Fixed auxiliary assets pulled independently of the version mirror. The
/// prebuilt index seed shares the cache-document name so a fresh install
/// starts from the published mapping.
pub(crate) const AUX_ASSETS: [AuxAsset; 7] = [
    AuxAsset { name: "empty_helmet.png", in_ui_dir: true },
    AuxAsset { name: "empty_chestplate.png", in_ui_dir: true },
    AuxAsset { name: "empty_leggings.png", in_ui_dir: true },
    AuxAsset { name: "empty_boots.png", in_ui_dir: true },
    AuxAsset { name: "empty_shield.png", in_ui_dir: true },
    AuxAsset { name: "inventory_bg.png", in_ui_dir: false },
    AuxAsset { name: "jemsire_index.json", in_ui_dir: false },
];

pub(crate) fn aux_asset_path(layout: &CacheLayout, asset: &AuxAsset) -> PathBuf {
    if asset.in_ui_dir {
        layout.ui_dir().join(asset.name)
    } else {
        layout.root().join(asset.name)
    }
}

fn is_present(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.len() >= MIN_ASSET_BYTES)
}

/// Ensure every fixed asset exists locally and passes the size check.
/// Per-asset failures are logged and skipped; the batch never aborts.
/// Returns how many assets were (re-)fetched.
pub(crate) async fn sync_aux_assets(
    client: &reqwest::Client,
    endpoints: &RemoteEndpoints,
    layout: &CacheLayout,
) -> usize {
    let mut fetched = 0;
    for asset in &AUX_ASSETS {
        let path = aux_asset_path(layout, asset);
        if is_present(&path) {
            debug!(name = asset.name, "auxiliary asset up to date");
            continue;
        }
        let url = endpoints.aux_asset_url(asset.name, asset.in_ui_dir);
        info!(name = asset.name, "syncing auxiliary asset");
        match fetch_to_file(client, &url, &path).await {
            Ok(_) => fetched += 1,
            Err(err) => warn!(%err, name = asset.name, "auxiliary asset sync failed"),
        }
    }
    fetched
}

/// Locate an auxiliary asset by name, checking the `ui/` directory first and
/// the cache root second. A missing `.png` suffix is tolerated.
pub(crate) fn lookup_aux_asset(layout: &CacheLayout, name: &str) -> Option<PathBuf> {
    let file_name = if name.ends_with(".png") {
        name.to_string()
    } else {
        format!("{name}.png")
    };
    let candidates = [layout.ui_dir().join(&file_name), layout.root().join(&file_name)];
    candidates.into_iter().find(|path| path.exists())
}

async fn fetch_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    let response = client
        .get(url)
        .timeout(HTTP_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("unexpected response for {url}"))?;
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("stream error for {url}"))?;

    let parent = dest
        .parent()
        .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf);
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("failed to create temp file under {}", parent.display()))?;
    tmp.write_all(&bytes).context("writing asset")?;
    tmp.persist(dest)
        .map_err(|err| anyhow!("unable to persist asset: {err}"))?;
    Ok(bytes.len() as u64)
}
