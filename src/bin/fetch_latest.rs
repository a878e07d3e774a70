//! Download the newest EPD monthly files and rewrite the manifest.
//!
//! Usage: `fetch_latest [COUNT]` (default 3, or `catalog.months` from config).

use anyhow::Result;
use epdscraper::{
    config::{count_from_args, Config},
    fetch, logging,
};
use reqwest::Client;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");

    let cfg = Config::load()?.with_count(count_from_args()?);
    let summary = fetch::run_fetch(&Client::new(), &cfg).await?;

    info!(
        chosen = summary.chosen,
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        manifest = %cfg.paths.manifest.display(),
        "done"
    );
    Ok(())
}
