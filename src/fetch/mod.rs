// src/fetch/mod.rs

pub mod catalog;
pub mod download;
pub mod manifest;
pub mod select;

use anyhow::Result;
use reqwest::Client;
use tracing::{error, info, instrument, warn};

use crate::config::Config;

pub use catalog::{fetch_resources, Resource};
pub use download::{download_to, target_path, DownloadOutcome};
pub use manifest::{write_manifest, ManifestEntry};
pub use select::{pick_latest, resource_date, ResourceFilter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub chosen: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Fetch the newest `catalog.months` dataset files into `paths.raw_dir`
/// and overwrite the manifest with what was handled.
///
/// Resources are downloaded one at a time. If one fails, the manifest is
/// still written for the ones already done before the error is returned.
#[instrument(level = "info", skip_all)]
pub async fn run_fetch(client: &Client, cfg: &Config) -> Result<FetchSummary> {
    let resources = fetch_resources(client, &cfg.catalog).await?;
    let filter = ResourceFilter::new(&cfg.catalog.name_filters, &cfg.catalog.preferred_format);
    let chosen = pick_latest(&resources, cfg.catalog.months, &filter);
    info!(
        available = resources.len(),
        chosen = chosen.len(),
        "selected resources"
    );

    let mut summary = FetchSummary {
        chosen: chosen.len(),
        ..FetchSummary::default()
    };
    let mut entries = Vec::with_capacity(chosen.len());

    for res in &chosen {
        let Some(url) = res.url.as_deref().filter(|u| !u.is_empty()) else {
            warn!(name = ?res.name, "resource has no url; skipping");
            continue;
        };
        let dest = target_path(&cfg.paths.raw_dir, res);

        match download_to(client, url, &dest, cfg.catalog.download_timeout()).await {
            Ok(DownloadOutcome::Skipped) => summary.skipped += 1,
            Ok(DownloadOutcome::Downloaded { bytes }) => {
                summary.downloaded += 1;
                summary.bytes += bytes;
            }
            Err(e) => {
                error!(url, error = %e, "download failed");
                write_manifest(&cfg.paths.manifest, &entries)?;
                return Err(e);
            }
        }

        entries.push(ManifestEntry::new(res, url, &dest));
    }

    write_manifest(&cfg.paths.manifest, &entries)?;
    info!(
        entries = entries.len(),
        manifest = %cfg.paths.manifest.display(),
        "saved manifest"
    );
    Ok(summary)
}
