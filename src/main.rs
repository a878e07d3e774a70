use anyhow::Result;
use epdscraper::{config, fetch, logging, process};
use reqwest::Client;
use tokio::time::Instant;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    logging::init("info");
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let cfg = config::Config::load()?.with_count(config::count_from_args()?);

    // ─── 3) fetch the newest monthly files ───────────────────────────
    let start = Instant::now();
    let client = Client::new();
    let fetched = fetch::run_fetch(&client, &cfg).await?;
    info!(
        downloaded = fetched.downloaded,
        skipped = fetched.skipped,
        bytes = fetched.bytes,
        elapsed = ?start.elapsed(),
        "fetch done"
    );

    // ─── 4) filter raw files down to antibiotics ─────────────────────
    let start = Instant::now();
    let filtered = tokio::task::spawn_blocking({
        let cfg = cfg.clone();
        move || process::run_filter(&cfg)
    })
    .await??;
    info!(
        files = filtered.files,
        rows_kept = filtered.stats.rows_kept,
        elapsed = ?start.elapsed(),
        "filter done"
    );

    info!("all done");
    Ok(())
}
