//! Filter the newest raw files down to antibiotic prescribing rows.
//!
//! Usage: `build_subset [COUNT]` (default 3, or `filter.files` from config).

use anyhow::Result;
use epdscraper::{
    config::{count_from_args, Config},
    logging, process,
};
use tracing::info;

fn main() -> Result<()> {
    logging::init("info");

    let cfg = Config::load()?.with_count(count_from_args()?);
    let summary = process::run_filter(&cfg)?;

    info!(
        files = summary.files,
        inputs = summary.inputs,
        rows_read = summary.stats.rows_read,
        rows_kept = summary.stats.rows_kept,
        output = %cfg.paths.output.display(),
        "finished"
    );
    Ok(())
}
