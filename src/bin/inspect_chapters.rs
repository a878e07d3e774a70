use anyhow::Result;
use epdscraper::{config::Config, process::inspect::chapter_counts};
use std::{env, path::Path, process::exit};

const SAMPLE_ROWS: usize = 200_000;
const TOP: usize = 50;

fn main() -> Result<()> {
    // Expect exactly one CLI argument: a raw CSV or ZIP.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <RAW_FILE>", args[0]);
        exit(1);
    }

    let cfg = Config::load()?;
    let column = &cfg.filter.chapter_column;
    let counts = chapter_counts(Path::new(&args[1]), column, SAMPLE_ROWS, TOP)?;

    println!("=== {} (first {} rows) ===", column, SAMPLE_ROWS);
    for (value, count) in counts {
        println!("{:<16} {:>10}", value, count);
    }
    Ok(())
}
