// src/process/columns.rs

/// Trim whitespace (and a leading byte-order mark) and upper-case each
/// header name.
pub fn clean_columns<I, S>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    headers
        .into_iter()
        .map(|h| h.as_ref().trim_start_matches('\u{feff}').trim().to_uppercase())
        .collect()
}

/// Which allow-listed columns a file has, and where they sit in its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    /// Kept column names, in allow-list order.
    pub names: Vec<String>,
    /// Source index in the file for each kept column.
    pub indices: Vec<usize>,
}

impl ColumnPlan {
    /// Intersect a cleaned file header with the allow-list. The first
    /// occurrence wins if the file repeats a column name.
    pub fn new(header: &[String], allow_list: &[String]) -> Self {
        let mut names = Vec::new();
        let mut indices = Vec::new();
        for wanted in allow_list {
            let wanted = wanted.trim().to_uppercase();
            if let Some(idx) = header.iter().position(|h| *h == wanted) {
                if !names.contains(&wanted) {
                    names.push(wanted);
                    indices.push(idx);
                }
            }
        }
        Self { names, indices }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Pick the kept cells out of a source record. Cells past the end of a
    /// short record come back empty.
    pub fn project(&self, record: &csv::StringRecord) -> Vec<String> {
        self.indices
            .iter()
            .map(|&i| record.get(i).unwrap_or_default().to_string())
            .collect()
    }
}
