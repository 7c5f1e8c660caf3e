use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use dirs_next::home_dir;

/// File name of the persisted cache document, matching the prebuilt seed
/// published in the upstream asset repository.
pub const CACHE_FILE_NAME: &str = "jemsire_index.json";

const GALLERY_URL: &str = "https://minecraftallimages.jemsire.com";
const MARKER_URL: &str =
    "https://raw.githubusercontent.com/TinyTank800/MinecraftAllImages/refs/heads/main/version.json";
const ASSETS_REPO_URL: &str =
    "https://raw.githubusercontent.com/zKauaFerreira/Exo-Lib/main/src/exo_inventory/data";

/// Remote hosts the cache mirrors from. Defaults point at the public
/// gallery; tests and alternative deployments substitute their own.
#[derive(Debug, Clone)]
pub struct RemoteEndpoints {
    /// Gallery root serving `manifest.json`, per-version `changes.json`
    /// feeds, and per-version zip archives.
    pub gallery_url: String,
    /// Freshness marker document.
    pub marker_url: String,
    /// Repository of fixed auxiliary assets.
    pub assets_repo_url: String,
}

impl Default for RemoteEndpoints {
    fn default() -> Self {
        Self {
            gallery_url: GALLERY_URL.to_string(),
            marker_url: MARKER_URL.to_string(),
            assets_repo_url: ASSETS_REPO_URL.to_string(),
        }
    }
}

impl RemoteEndpoints {
    pub fn manifest_url(&self) -> String {
        format!("{}/manifest.json", self.gallery_url)
    }

    pub fn changes_url(&self, version: &str) -> String {
        format!("{}/images/{version}/changes.json", self.gallery_url)
    }

    pub fn archive_url(&self, version: &str) -> String {
        format!("{}/images/{version}.zip", self.gallery_url)
    }

    pub fn aux_asset_url(&self, name: &str, in_ui_dir: bool) -> String {
        if in_ui_dir {
            format!("{}/ui/{name}", self.assets_repo_url)
        } else {
            format!("{}/{name}", self.assets_repo_url)
        }
    }
}

/// On-disk layout of one cache instance. Instances over different roots are
/// fully independent.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted cache document.
    pub fn cache_file(&self) -> PathBuf {
        self.root.join(CACHE_FILE_NAME)
    }

    /// Root of the per-version extracted archives.
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    /// Fixed auxiliary assets.
    pub fn ui_dir(&self) -> PathBuf {
        self.root.join("ui")
    }
}

#[derive(Debug, Clone)]
pub struct CacheLocation {
    pub path: PathBuf,
    pub source: &'static str,
}

/// Resolve the default cache root: `ICONVAULT_CACHE_PATH` override, else the
/// platform cache base plus `iconvault`.
pub fn resolve_cache_root() -> Result<CacheLocation> {
    if let Some(override_path) = env::var_os("ICONVAULT_CACHE_PATH") {
        let path = absolutize(PathBuf::from(override_path))?;
        return Ok(CacheLocation {
            path,
            source: "ICONVAULT_CACHE_PATH",
        });
    }

    #[cfg(target_os = "windows")]
    let (base, source) = resolve_windows_cache_base()?;
    #[cfg(not(target_os = "windows"))]
    let (base, source) = resolve_unix_cache_base()?;

    Ok(CacheLocation {
        path: base.join("iconvault"),
        source,
    })
}

#[cfg(not(target_os = "windows"))]
fn resolve_unix_cache_base() -> Result<(PathBuf, &'static str)> {
    if let Some(xdg) = env::var_os("XDG_CACHE_HOME") {
        return Ok((PathBuf::from(xdg), "XDG_CACHE_HOME"));
    }
    let home = home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    Ok((home.join(".cache"), "~/.cache"))
}

#[cfg(target_os = "windows")]
fn resolve_windows_cache_base() -> Result<(PathBuf, &'static str)> {
    if let Some(local) = env::var_os("LOCALAPPDATA") {
        return Ok((PathBuf::from(local), "LOCALAPPDATA"));
    }
    if let Some(user_profile) = env::var_os("USERPROFILE") {
        return Ok((
            PathBuf::from(user_profile).join("AppData").join("Local"),
            "USERPROFILE",
        ));
    }
    let home = home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    Ok((home.join("AppData").join("Local"), "home/AppData/Local"))
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::ffi::OsString;

    #[test]
    #[serial]
    fn resolves_cache_path_override() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("cache-root");
        std::fs::create_dir_all(&override_path)?;
        let previous: Option<OsString> = env::var_os("ICONVAULT_CACHE_PATH");
        env::set_var("ICONVAULT_CACHE_PATH", &override_path);
        let location = resolve_cache_root()?;
        match previous {
            Some(value) => env::set_var("ICONVAULT_CACHE_PATH", value),
            None => env::remove_var("ICONVAULT_CACHE_PATH"),
        }

        assert_eq!(location.source, "ICONVAULT_CACHE_PATH");
        assert_eq!(location.path.canonicalize()?, override_path.canonicalize()?);
        Ok(())
    }

    #[test]
    fn layout_places_state_under_the_root() {
        let layout = CacheLayout::new("/tmp/vault");
        assert_eq!(layout.cache_file(), Path::new("/tmp/vault").join(CACHE_FILE_NAME));
        assert_eq!(layout.versions_dir(), Path::new("/tmp/vault/versions"));
        assert_eq!(layout.version_dir("1.17.1"), Path::new("/tmp/vault/versions/1.17.1"));
        assert_eq!(layout.ui_dir(), Path::new("/tmp/vault/ui"));
    }

    #[test]
    fn endpoints_compose_gallery_urls() {
        let endpoints = RemoteEndpoints::default();
        assert!(endpoints.manifest_url().ends_with("/manifest.json"));
        assert!(endpoints
            .changes_url("1.17.1")
            .ends_with("/images/1.17.1/changes.json"));
        assert!(endpoints.archive_url("1.17.1").ends_with("/images/1.17.1.zip"));
        assert!(endpoints
            .aux_asset_url("empty_shield.png", true)
            .ends_with("/ui/empty_shield.png"));
        assert!(endpoints
            .aux_asset_url("inventory_bg.png", false)
            .ends_with("/inventory_bg.png"));
    }
}
