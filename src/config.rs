// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

/// Env var naming a YAML config file.
pub const CONFIG_ENV: &str = "EPDSCRAPER_CONFIG";

/// Config file picked up from the working directory when `CONFIG_ENV` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "epdscraper.yaml";

static DEFAULT_NAME_FILTERS: &[&str] = &["epd", "snomed"];

static DEFAULT_KEYWORDS: &[&str] = &[
    "cillin",
    "cycline",
    "mycin",
    "floxacin",
    "cef",
    "ceph",
    "penem",
    "azith",
    "clarith",
    "trimethoprim",
    "metronidazole",
];

static DEFAULT_COLUMNS: &[&str] = &[
    "YEAR_MONTH",
    "REGIONAL_OFFICE_NAME",
    "REGIONAL_OFFICE_CODE",
    "ICB_NAME",
    "ICB_CODE",
    "PCO_NAME",
    "PCO_CODE",
    "PRACTICE_NAME",
    "PRACTICE_CODE",
    "POSTCODE",
    "BNF_CHEMICAL_SUBSTANCE",
    "BNF_PRESENTATION_NAME",
    "BNF_CHAPTER_PLUS_CODE",
    "QUANTITY",
    "ITEMS",
    "NIC",
    "ACTUAL_COST",
    "SNOMED_CODE",
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub paths: PathsConfig,
    pub filter: FilterConfig,
}

/// Where the dataset lives on the CKAN portal and which resources to take.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub dataset_id: String,
    /// Every one of these must appear in the lower-cased resource name.
    pub name_filters: Vec<String>,
    pub preferred_format: String,
    pub months: usize,
    pub request_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://opendata.nhsbsa.net".to_string(),
            dataset_id: "english-prescribing-dataset-epd-with-snomed-code".to_string(),
            name_filters: owned(DEFAULT_NAME_FILTERS),
            preferred_format: "zip".to_string(),
            months: 3,
            request_timeout_secs: 60,
            download_timeout_secs: 120,
        }
    }
}

impl CatalogConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub manifest: PathBuf,
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            manifest: PathBuf::from("data/manifest.json"),
            output: PathBuf::from("data/processed/epd_antibiotics_3m.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub files: usize,
    pub batch_rows: usize,
    pub chapter_column: String,
    pub chapter_prefix: String,
    pub presentation_column: String,
    pub substance_column: String,
    pub keywords: Vec<String>,
    /// Allow-list of output columns, in output order.
    pub columns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            files: 3,
            batch_rows: 200_000,
            chapter_column: "BNF_CHAPTER_PLUS_CODE".to_string(),
            chapter_prefix: "05".to_string(),
            presentation_column: "BNF_PRESENTATION_NAME".to_string(),
            substance_column: "BNF_CHEMICAL_SUBSTANCE".to_string(),
            keywords: owned(DEFAULT_KEYWORDS),
            columns: owned(DEFAULT_COLUMNS),
        }
    }
}

impl Config {
    /// Parse a YAML config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// `$EPDSCRAPER_CONFIG`, then `./epdscraper.yaml`, then built-in defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            info!(path = %path, "loading config from {}", CONFIG_ENV);
            return Self::from_file(path);
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            info!(path = %local.display(), "loading config");
            return Self::from_file(local);
        }
        debug!("no config file; using defaults");
        Ok(Self::default())
    }

    /// Apply the optional file-count argument the binaries accept.
    pub fn with_count(mut self, count: Option<usize>) -> Self {
        if let Some(n) = count {
            self.catalog.months = n;
            self.filter.files = n;
        }
        self
    }
}

/// First positional argument as a count, e.g. `fetch_latest 6`.
pub fn count_from_args() -> Result<Option<usize>> {
    match env::args().nth(1) {
        Some(arg) => arg
            .parse::<usize>()
            .map(Some)
            .with_context(|| format!("expected a file count, got {:?}", arg)),
        None => Ok(None),
    }
}
