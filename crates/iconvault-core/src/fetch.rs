use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::Path;

use anyhow::{Context, Result};
use zip::ZipArchive;

use crate::net::ARCHIVE_TIMEOUT;

/// Download one version archive and extract it into `dest`.
///
/// The destination directory is created on demand; archive entries with
/// hostile paths are skipped. Returns the compressed byte count on success.
/// Failures are reported to the caller as values to aggregate, not to
/// abort on — a sync must survive individual version failures.
pub(crate) async fn fetch_archive(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64> {
    let response = client
        .get(url)
        .timeout(ARCHIVE_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("unexpected response for {url}"))?;
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("stream error for {url}"))?;
    extract_archive(&bytes, dest)?;
    Ok(bytes.len() as u64)
}

pub(crate) fn extract_archive(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("reading archive")?;
    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(enclosed) = entry.enclosed_name().map(|p| dest.join(p)) else {
            continue;
        };
        if entry.name().ends_with('/') || entry.is_dir() {
            fs::create_dir_all(&enclosed)?;
            continue;
        }
        if let Some(parent) = enclosed.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&enclosed)?;
        io::copy(&mut entry, &mut outfile)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).expect("start entry");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish archive");
    }
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::request, responders::status_code, Expectation, Server};

    #[test]
    fn extracts_nested_entries() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let bytes = zip_bytes(&[
            ("apple.png", b"apple-bytes"),
            ("textures/items/sword.png", b"sword-bytes"),
        ]);
        extract_archive(&bytes, temp.path())?;
        assert_eq!(fs::read(temp.path().join("apple.png"))?, b"apple-bytes");
        assert_eq!(
            fs::read(temp.path().join("textures/items/sword.png"))?,
            b"sword-bytes"
        );
        Ok(())
    }

    #[test]
    fn skips_entries_escaping_the_destination() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let dest = temp.path().join("out");
        let bytes = zip_bytes(&[("../evil.png", b"nope"), ("ok.png", b"fine")]);
        extract_archive(&bytes, &dest)?;
        assert!(!temp.path().join("evil.png").exists());
        assert!(dest.join("ok.png").exists());
        Ok(())
    }

    #[test]
    fn rejects_non_archive_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(extract_archive(b"definitely not a zip", temp.path()).is_err());
    }

    #[tokio::test]
    async fn download_failure_surfaces_as_an_error() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/images/1.17.1.zip"))
                .respond_with(status_code(500)),
        );
        let temp = tempfile::tempdir()?;
        let client = crate::net::http_client()?;
        let result = fetch_archive(
            &client,
            &server.url_str("/images/1.17.1.zip"),
            &temp.path().join("1.17.1"),
        )
        .await;
        assert!(result.is_err());
        assert!(!temp.path().join("1.17.1").exists());
        Ok(())
    }
}
