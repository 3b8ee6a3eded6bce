//! Fetch text of remote merge lists, missing files and override files

use crate::config::NetworkConfig;
use crate::error::{LicenseError, Result};
use reqwest::Client;
use std::path::Path;
use tracing::debug;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Whether a location is fetched over http(s)
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Fetch the text behind a location: an http(s) url, a `file://` url or a path
pub async fn fetch_text(location: &str, config: &NetworkConfig) -> Result<String> {
    if is_remote(location) {
        return fetch_url(location, config).await;
    }

    let path = location.strip_prefix("file://").unwrap_or(location);
    debug!("Reading {}", path);
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LicenseError::file(Path::new(path), e))
}

/// Fetch an optional location
pub async fn fetch_optional(
    location: Option<&str>,
    config: &NetworkConfig,
) -> Result<Option<String>> {
    match location.map(str::trim).filter(|l| !l.is_empty()) {
        Some(location) => fetch_text(location, config).await.map(Some),
        None => Ok(None),
    }
}

async fn fetch_url(url: &str, config: &NetworkConfig) -> Result<String> {
    debug!("Fetching {}", url);

    let client = build_client(config)?;
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(LicenseError::fetch(
            url,
            format!("HTTP {}", response.status()),
        ));
    }

    Ok(response.text().await?)
}

/// Build HTTP client with proper configuration
fn build_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .build()
        .map_err(|e| LicenseError::fetch("client", format!("Failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_http_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/merges.txt")
            .with_status(200)
            .with_body("Apache-2.0|ASL\n")
            .create_async()
            .await;

        let url = format!("{}/merges.txt", server.url());
        let body = fetch_text(&url, &NetworkConfig::default()).await.unwrap();

        assert_eq!(body, "Apache-2.0|ASL\n");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_status_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.properties")
            .with_status(404)
            .create_async()
            .await;

        let url = format!("{}/missing.properties", server.url());
        let result = fetch_text(&url, &NetworkConfig::default()).await;
        assert!(matches!(result, Err(LicenseError::FetchError { .. })));
    }

    #[tokio::test]
    async fn test_fetch_file_url_and_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("override.properties");
        std::fs::write(&path, "g--a--1=MIT\n").unwrap();

        let plain = fetch_text(path.to_str().unwrap(), &NetworkConfig::default())
            .await
            .unwrap();
        let url = format!("file://{}", path.display());
        let via_url = fetch_text(&url, &NetworkConfig::default()).await.unwrap();

        assert_eq!(plain, "g--a--1=MIT\n");
        assert_eq!(via_url, plain);
    }

    #[tokio::test]
    async fn test_absent_location_is_none() {
        let config = NetworkConfig::default();
        assert!(fetch_optional(None, &config).await.unwrap().is_none());
        assert!(fetch_optional(Some("  "), &config).await.unwrap().is_none());
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.org/x"));
        assert!(!is_remote("file:///tmp/x"));
    }
}
