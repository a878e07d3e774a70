// src/process/mod.rs

pub mod batch;
pub mod columns;
pub mod inspect;
pub mod output;
pub mod predicate;

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

use crate::config::Config;

pub use batch::{filter_csv, BatchStats, RowBatch};
pub use columns::{clean_columns, ColumnPlan};
pub use output::OutputCsv;
pub use predicate::AntibioticMatcher;

static RAW_PATTERNS: &[&str] = &["*.csv", "*.zip"];

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// The `count` most recently modified `.csv`/`.zip` files in `raw_dir`,
/// newest first.
pub fn select_recent_files(raw_dir: &Path, count: usize) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    for pattern in RAW_PATTERNS {
        let pattern = format!(
            "{}/{}",
            Pattern::escape(&raw_dir.display().to_string()),
            pattern
        );
        for entry in glob_with(&pattern, options)? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            let modified = path
                .metadata()
                .and_then(|m| m.modified())
                .with_context(|| format!("reading mtime of {}", path.display()))?;
            found.push((modified, path));
        }
    }

    found.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(found.into_iter().take(count).map(|(_, p)| p).collect())
}

/// Call `f` with a reader for every CSV held by `path`: the file itself,
/// or each `.csv` entry of a ZIP in archive order, streamed without
/// extracting.
pub fn for_each_csv<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(&str, &mut dyn Read) -> Result<()>,
{
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let source = path.display().to_string();

    if !is_zip(path) {
        let mut reader = BufReader::new(file);
        return f(&source, &mut reader);
    }

    let mut archive =
        ZipArchive::new(BufReader::new(file)).with_context(|| format!("reading ZIP {}", source))?;
    let mut seen = 0;
    for idx in 0..archive.len() {
        let mut entry = archive
            .by_index(idx)
            .with_context(|| format!("opening entry {} of {}", idx, source))?;
        let name = entry.name().to_string();
        if !name.to_lowercase().ends_with(".csv") {
            debug!(zip = %source, entry = %name, "skipping non-CSV entry");
            continue;
        }
        seen += 1;
        f(&format!("{}!{}", source, name), &mut entry)?;
    }
    if seen == 0 {
        warn!(zip = %source, "no CSV entries in archive");
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub files: usize,
    pub inputs: usize,
    pub stats: BatchStats,
}

/// Filter the newest `filter.files` raw files into `paths.output`.
///
/// Files are handled one after another; the first error aborts the run and
/// whatever was already appended stays in the output.
#[instrument(level = "info", skip_all)]
pub fn run_filter(cfg: &Config) -> Result<FilterSummary> {
    let files = select_recent_files(&cfg.paths.raw_dir, cfg.filter.files)?;
    if files.is_empty() {
        warn!(raw_dir = %cfg.paths.raw_dir.display(), "no raw files to filter");
    }

    let matcher = AntibioticMatcher::from_config(&cfg.filter);
    let mut out = OutputCsv::open(&cfg.paths.output)?;
    let mut summary = FilterSummary {
        files: files.len(),
        ..FilterSummary::default()
    };

    for path in &files {
        info!(file = %path.display(), "processing");
        for_each_csv(path, |source, reader| {
            let stats = filter_csv(reader, source, &cfg.filter, &matcher, &mut out)?;
            summary.inputs += 1;
            summary.stats.add(stats);
            Ok(())
        })?;
    }

    info!(
        files = summary.files,
        rows_read = summary.stats.rows_read,
        rows_kept = summary.stats.rows_kept,
        output = %out.path().display(),
        "antibiotics subset saved"
    );
    Ok(summary)
}
