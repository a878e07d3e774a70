// src/fetch/catalog.rs

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogConfig;

const PACKAGE_SHOW_PATH: &str = "api/3/action/package_show";

/// One downloadable file entry in the dataset's CKAN metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub metadata_modified: Option<String>,
}

impl Resource {
    pub fn name_lower(&self) -> String {
        self.name.as_deref().unwrap_or_default().to_lowercase()
    }

    pub fn format_lower(&self) -> String {
        self.format.as_deref().unwrap_or_default().to_lowercase()
    }
}

#[derive(Debug, Deserialize)]
struct PackageShow {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    #[serde(default)]
    resources: Vec<Resource>,
}

/// `{base_url}/api/3/action/package_show`
pub fn package_show_url(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url).with_context(|| format!("parsing base URL {}", base_url))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(PACKAGE_SHOW_PATH)
        .with_context(|| format!("joining {} onto {}", PACKAGE_SHOW_PATH, base))
}

/// Ask the portal for the dataset's resource list, in catalog order.
#[instrument(level = "info", skip(client, cfg), fields(dataset = %cfg.dataset_id))]
pub async fn fetch_resources(client: &Client, cfg: &CatalogConfig) -> Result<Vec<Resource>> {
    let url = package_show_url(&cfg.base_url)?;
    debug!(%url, "requesting package metadata");

    let body: PackageShow = client
        .get(url.clone())
        .query(&[("id", cfg.dataset_id.as_str())])
        .timeout(cfg.request_timeout())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .json()
        .await
        .with_context(|| format!("decoding package_show body from {}", url))?;

    if !body.success {
        bail!("catalog returned success=false for {}", cfg.dataset_id);
    }

    let resources = body.result.map(|p| p.resources).unwrap_or_default();
    debug!(count = resources.len(), "catalog resources");
    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog_for(server: &MockServer) -> CatalogConfig {
        CatalogConfig {
            base_url: server.uri(),
            dataset_id: "epd-test".to_string(),
            ..CatalogConfig::default()
        }
    }

    #[test]
    fn package_show_url_handles_trailing_slash() -> Result<()> {
        assert_eq!(
            package_show_url("https://portal.example")?.as_str(),
            "https://portal.example/api/3/action/package_show"
        );
        assert_eq!(
            package_show_url("https://portal.example/ckan/")?.as_str(),
            "https://portal.example/ckan/api/3/action/package_show"
        );
        Ok(())
    }

    #[tokio::test]
    async fn returns_resources_in_catalog_order() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3/action/package_show"))
            .and(query_param("id", "epd-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": {
                    "resources": [
                        {"name": "EPD SNOMED 202401", "format": "ZIP", "url": "http://x/a.zip",
                         "created": "2024-01-05T10:00:00", "size": 12},
                        {"name": "EPD SNOMED 202402", "format": "CSV", "url": "http://x/b.csv"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let resources = fetch_resources(&Client::new(), &catalog_for(&server)).await?;
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].name.as_deref(), Some("EPD SNOMED 202401"));
        assert_eq!(resources[0].format_lower(), "zip");
        assert_eq!(resources[0].created.as_deref(), Some("2024-01-05T10:00:00"));
        assert_eq!(resources[1].created, None);
        Ok(())
    }

    #[tokio::test]
    async fn success_false_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3/action/package_show"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": {}})),
            )
            .mount(&server)
            .await;

        let err = fetch_resources(&Client::new(), &catalog_for(&server))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("success=false"));
    }

    #[tokio::test]
    async fn http_error_status_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetch_resources(&Client::new(), &catalog_for(&server)).await;
        assert!(result.is_err());
    }
}
