use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

pub(crate) const USER_AGENT: &str = concat!("iconvault/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout for small JSON documents and fixed assets.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-version change feeds are tiny; give up on them quickly.
pub(crate) const DIFF_TIMEOUT: Duration = Duration::from_secs(5);
/// Version archives are tens of megabytes.
pub(crate) const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build http client")
}

/// Fetch and decode a JSON document, treating any transport failure,
/// non-success status, or shape mismatch as an absent document.
pub(crate) async fn get_json_lenient<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Option<T> {
    let response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%err, url, "request failed");
            return None;
        }
    };
    let response = match response.error_for_status() {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%err, url, "unexpected response");
            return None;
        }
    };
    match response.json::<T>().await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(%err, url, "malformed response body");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::request, responders::*, Expectation, Server};
    use iconvault_domain::VersionMarker;

    #[tokio::test]
    async fn lenient_get_decodes_well_formed_documents() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/version.json"))
                .respond_with(json_encoded(serde_json::json!({"message": "v42"}))),
        );

        let client = http_client().expect("client");
        let marker: Option<VersionMarker> =
            get_json_lenient(&client, &server.url_str("/version.json"), HTTP_TIMEOUT).await;
        assert_eq!(marker.expect("marker").message, "v42");
    }

    #[tokio::test]
    async fn lenient_get_maps_failures_to_none() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/missing.json"))
                .respond_with(status_code(404)),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/garbage.json"))
                .respond_with(status_code(200).body("not json")),
        );

        let client = http_client().expect("client");
        let missing: Option<VersionMarker> =
            get_json_lenient(&client, &server.url_str("/missing.json"), HTTP_TIMEOUT).await;
        assert!(missing.is_none());
        let garbage: Option<VersionMarker> =
            get_json_lenient(&client, &server.url_str("/garbage.json"), HTTP_TIMEOUT).await;
        assert!(garbage.is_none());
    }
}
