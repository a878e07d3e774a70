// src/process/predicate.rs

use crate::config::FilterConfig;

/// Two-stage row test: BNF chapter prefix first, then drug-name keywords.
#[derive(Debug, Clone)]
pub struct AntibioticMatcher {
    chapter_prefix: String,
    keywords: Vec<String>,
}

impl AntibioticMatcher {
    pub fn new(chapter_prefix: impl Into<String>, keywords: &[String]) -> Self {
        Self {
            chapter_prefix: chapter_prefix.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn from_config(cfg: &FilterConfig) -> Self {
        Self::new(cfg.chapter_prefix.clone(), &cfg.keywords)
    }

    pub fn chapter_matches(&self, chapter: &str) -> bool {
        chapter.starts_with(&self.chapter_prefix)
    }

    pub fn name_matches(&self, presentation: &str, substance: &str) -> bool {
        let name = format!("{} {}", presentation, substance).to_lowercase();
        self.keywords.iter().any(|k| name.contains(k.as_str()))
    }

    /// Missing cells are passed as empty strings and fail the chapter test.
    pub fn is_match(&self, chapter: &str, presentation: &str, substance: &str) -> bool {
        self.chapter_matches(chapter) && self.name_matches(presentation, substance)
    }
}
