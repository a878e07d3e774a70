// src/process/output.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use std::{
    fs::{self, OpenOptions},
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// The cumulative output CSV.
///
/// The header is fixed by the first batch that has rows, or adopted from
/// the file if it already has one. Every later batch is laid out onto that
/// header by column name: unknown columns are dropped and header columns
/// the batch lacks are written empty.
#[derive(Debug)]
pub struct OutputCsv {
    path: PathBuf,
    header: Option<Vec<String>>,
    rows_written: u64,
}

impl OutputCsv {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }

        let header = read_existing_header(&path)?;
        if let Some(h) = &header {
            info!(path = %path.display(), columns = h.len(), "appending to existing output");
        }

        Ok(Self {
            path,
            header,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Rows appended through this handle.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Append `rows` (laid out as `columns`). Opens the file in append mode
    /// for the duration of the call. Returns how many rows were written.
    pub fn append(&mut self, columns: &[String], rows: &[Vec<String>]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {} for append", self.path.display()))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(BufWriter::new(file));

        let header = match &self.header {
            Some(h) => h.clone(),
            None => {
                writer
                    .write_record(columns)
                    .context("writing output header")?;
                debug!(columns = columns.len(), "wrote output header");
                self.header = Some(columns.to_vec());
                columns.to_vec()
            }
        };

        let layout: Vec<Option<usize>> = header
            .iter()
            .map(|h| columns.iter().position(|c| c == h))
            .collect();
        let identity = layout.len() == columns.len()
            && layout.iter().enumerate().all(|(i, pos)| *pos == Some(i));

        for row in rows {
            if identity {
                writer.write_record(row)?;
            } else {
                writer.write_record(
                    layout
                        .iter()
                        .map(|pos| pos.and_then(|i| row.get(i)).map_or("", String::as_str)),
                )?;
            }
        }

        writer
            .flush()
            .with_context(|| format!("flushing {}", self.path.display()))?;
        self.rows_written += rows.len() as u64;
        Ok(rows.len())
    }
}

fn read_existing_header(path: &Path) -> Result<Option<Vec<String>>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => {}
        _ => return Ok(None),
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening existing output {}", path.display()))?;
    let header = reader
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?;
    if header.is_empty() {
        return Ok(None);
    }
    Ok(Some(header.iter().map(str::to_string).collect()))
}
