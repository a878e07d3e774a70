use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::{collections::HashMap, io::Read, path::Path};

use super::{clean_columns, for_each_csv};

/// Most frequent values of `column` in the first `sample_rows` records,
/// as `(value, count)` sorted by count descending then value ascending.
/// Blank cells are ignored and values are trimmed.
pub fn value_counts<R: Read>(
    reader: R,
    source: &str,
    column: &str,
    sample_rows: usize,
    top: usize,
) -> Result<Vec<(String, u64)>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let header = clean_columns(
        rdr.headers()
            .with_context(|| format!("reading header of {}", source))?
            .iter(),
    );
    let wanted = column.trim().to_uppercase();
    let Some(idx) = header.iter().position(|h| *h == wanted) else {
        bail!("{} has no column {}", source, wanted);
    };

    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut record = StringRecord::new();
    let mut read = 0;
    while read < sample_rows
        && rdr
            .read_record(&mut record)
            .with_context(|| format!("reading {}", source))?
    {
        read += 1;
        let value = record.get(idx).unwrap_or_default().trim();
        if !value.is_empty() {
            *counts.entry(value.to_string()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top);
    Ok(ranked)
}

/// `value_counts` over the first CSV in a raw file (plain or zipped).
pub fn chapter_counts(
    path: &Path,
    column: &str,
    sample_rows: usize,
    top: usize,
) -> Result<Vec<(String, u64)>> {
    let mut result = None;
    for_each_csv(path, |source, reader| {
        if result.is_none() {
            result = Some(value_counts(reader, source, column, sample_rows, top)?);
        }
        Ok(())
    })?;
    result.with_context(|| format!("no CSV data in {}", path.display()))
}
