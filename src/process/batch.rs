// src/process/batch.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use tracing::{debug, info, warn};

use super::{
    columns::{clean_columns, ColumnPlan},
    output::OutputCsv,
    predicate::AntibioticMatcher,
};
use crate::config::FilterConfig;

/// Rows read from one input, already projected onto the kept columns.
#[derive(Debug, Default)]
pub struct RowBatch {
    pub rows: Vec<Vec<String>>,
}

impl RowBatch {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            rows: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Positions of the predicate columns inside a projected row.
#[derive(Debug, Clone, Copy)]
struct PredicateCells {
    chapter: usize,
    presentation: Option<usize>,
    substance: Option<usize>,
}

impl PredicateCells {
    fn keep(&self, matcher: &AntibioticMatcher, row: &[String]) -> bool {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map_or("", String::as_str);
        matcher.is_match(
            cell(Some(self.chapter)),
            cell(self.presentation),
            cell(self.substance),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub rows_read: u64,
    pub rows_kept: u64,
    pub batches: u64,
}

impl BatchStats {
    pub fn add(&mut self, other: BatchStats) {
        self.rows_read = self.rows_read.saturating_add(other.rows_read);
        self.rows_kept = self.rows_kept.saturating_add(other.rows_kept);
        self.batches = self.batches.saturating_add(other.batches);
    }
}

/// Stream one CSV through the filter into `out`, `cfg.batch_rows` rows at
/// a time.
///
/// A record that cannot be parsed aborts with an error; batches already
/// appended stay in the output.
pub fn filter_csv<R: Read>(
    reader: R,
    source: &str,
    cfg: &FilterConfig,
    matcher: &AntibioticMatcher,
    out: &mut OutputCsv,
) -> Result<BatchStats> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = clean_columns(
        rdr.headers()
            .with_context(|| format!("reading header of {}", source))?
            .iter(),
    );
    let plan = ColumnPlan::new(&header, &cfg.columns);
    info!(source, keeping = ?plan.names, "header read");

    let mut stats = BatchStats::default();
    let Some(chapter) = plan.position(&cfg.chapter_column.to_uppercase()) else {
        warn!(
            source,
            column = %cfg.chapter_column,
            "chapter column missing; no row can match"
        );
        return Ok(stats);
    };
    let cells = PredicateCells {
        chapter,
        presentation: plan.position(&cfg.presentation_column.to_uppercase()),
        substance: plan.position(&cfg.substance_column.to_uppercase()),
    };

    let batch_rows = cfg.batch_rows.max(1);
    let mut batch = RowBatch::with_capacity(batch_rows);
    let mut record = StringRecord::new();

    loop {
        let more = rdr
            .read_record(&mut record)
            .with_context(|| format!("reading {} near row {}", source, stats.rows_read + 1))?;
        if more {
            stats.rows_read += 1;
            batch.rows.push(plan.project(&record));
        }

        if batch.len() >= batch_rows || (!more && !batch.is_empty()) {
            let kept = flush_batch(&mut batch, &plan, cells, matcher, out)?;
            stats.rows_kept += kept as u64;
            stats.batches += 1;
            debug!(
                source,
                batch = stats.batches,
                rows_read = stats.rows_read,
                kept,
                "batch filtered"
            );
        }

        if !more {
            break;
        }
    }

    info!(
        source,
        rows_read = stats.rows_read,
        rows_kept = stats.rows_kept,
        "input done"
    );
    Ok(stats)
}

fn flush_batch(
    batch: &mut RowBatch,
    plan: &ColumnPlan,
    cells: PredicateCells,
    matcher: &AntibioticMatcher,
    out: &mut OutputCsv,
) -> Result<usize> {
    batch.rows.retain(|row| cells.keep(matcher, row));
    let written = out.append(&plan.names, &batch.rows)?;
    batch.rows.clear();
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
YEAR_MONTH, practice_code ,BNF_CHAPTER_PLUS_CODE,BNF_PRESENTATION_NAME,BNF_CHEMICAL_SUBSTANCE,ITEMS,UNUSED
202401,A1,05010101,Amoxicillin 250mg capsules,Amoxicillin,3,x
202401,A1,0301,Salbutamol inhaler,Amoxicillin,1,x
202401,A2,0501,Doxycycline 100mg capsules,Doxycycline hyclate,2,x
202401,A2,0502,Fluconazole 150mg capsules,Fluconazole,5,x
202401,A3,,Cefalexin 500mg capsules,Cefalexin,4,x
202401,A3,0501,\"Co-amoxiclav 500mg/125mg, tablets\",Co-amoxiclav,7,x
";

    fn cfg(batch_rows: usize) -> FilterConfig {
        FilterConfig {
            batch_rows,
            ..FilterConfig::default()
        }
    }

    fn run(input: &str, batch_rows: usize) -> Result<(BatchStats, String)> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        let cfg = cfg(batch_rows);
        let matcher = AntibioticMatcher::from_config(&cfg);
        let mut out = OutputCsv::open(&path)?;
        let stats = filter_csv(input.as_bytes(), "sample.csv", &cfg, &matcher, &mut out)?;
        let text = fs::read_to_string(&path).unwrap_or_default();
        Ok((stats, text))
    }

    #[test]
    fn keeps_only_infection_chapter_antibiotics() -> Result<()> {
        let (stats, text) = run(SAMPLE, 1000)?;
        assert_eq!(stats.rows_read, 6);
        assert_eq!(stats.rows_kept, 2);
        assert_eq!(stats.batches, 1);
        assert_eq!(
            text,
            "YEAR_MONTH,PRACTICE_CODE,BNF_CHEMICAL_SUBSTANCE,BNF_PRESENTATION_NAME,BNF_CHAPTER_PLUS_CODE,ITEMS\n\
             202401,A1,Amoxicillin,Amoxicillin 250mg capsules,05010101,3\n\
             202401,A2,Doxycycline hyclate,Doxycycline 100mg capsules,0501,2\n"
        );
        Ok(())
    }

    #[test]
    fn small_batches_give_same_output_with_one_header() -> Result<()> {
        let (_, whole) = run(SAMPLE, 1000)?;
        let (stats, batched) = run(SAMPLE, 2)?;
        assert_eq!(stats.batches, 3);
        assert_eq!(whole, batched);
        assert_eq!(batched.matches("YEAR_MONTH").count(), 1);
        Ok(())
    }

    #[test]
    fn missing_chapter_column_keeps_nothing() -> Result<()> {
        let input = "BNF_PRESENTATION_NAME,ITEMS\nAmoxicillin 250mg capsules,1\n";
        let (stats, text) = run(input, 10)?;
        assert_eq!(stats.rows_kept, 0);
        assert!(text.is_empty());
        Ok(())
    }

    #[test]
    fn missing_substance_column_matches_on_presentation_only() -> Result<()> {
        let input = "BNF_CHAPTER_PLUS_CODE,BNF_PRESENTATION_NAME\n0501,Clarithromycin 250mg\n0501,Nystatin\n";
        let (stats, text) = run(input, 10)?;
        assert_eq!(stats.rows_kept, 1);
        assert_eq!(
            text,
            "BNF_PRESENTATION_NAME,BNF_CHAPTER_PLUS_CODE\nClarithromycin 250mg,0501\n"
        );
        Ok(())
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() -> Result<()> {
        let input = "BNF_PRESENTATION_NAME,BNF_CHAPTER_PLUS_CODE\nAmoxicillin\n";
        let (stats, _) = run(input, 10)?;
        assert_eq!(stats.rows_read, 1);
        assert_eq!(stats.rows_kept, 0);
        Ok(())
    }

    #[test]
    fn invalid_utf8_aborts_with_context() {
        let dir = tempdir().unwrap();
        let cfg = cfg(10);
        let matcher = AntibioticMatcher::from_config(&cfg);
        let mut out = OutputCsv::open(dir.path().join("out.csv")).unwrap();

        let mut input = b"BNF_CHAPTER_PLUS_CODE,BNF_PRESENTATION_NAME\n0501,".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let err = filter_csv(input.as_slice(), "bad.csv", &cfg, &matcher, &mut out).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.csv"));
    }
}
