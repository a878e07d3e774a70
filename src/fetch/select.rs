// src/fetch/select.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use super::catalog::Resource;

/// Which catalog resources count as monthly dataset files.
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    /// Lower-case substrings that must all appear in the resource name.
    pub name_contains: Vec<String>,
    /// Lower-case format taken on the first pass.
    pub preferred_format: String,
}

impl ResourceFilter {
    pub fn new(name_contains: &[String], preferred_format: &str) -> Self {
        Self {
            name_contains: name_contains.iter().map(|s| s.to_lowercase()).collect(),
            preferred_format: preferred_format.to_lowercase(),
        }
    }

    pub fn matches_name(&self, res: &Resource) -> bool {
        let name = res.name_lower();
        self.name_contains.iter().all(|needle| name.contains(needle))
    }

    fn is_preferred(&self, res: &Resource) -> bool {
        res.format_lower() == self.preferred_format
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Best available timestamp: `created`, then `last_modified`, then
/// `metadata_modified`, else the Unix epoch.
pub fn resource_date(res: &Resource) -> DateTime<Utc> {
    let candidates = [
        ("created", &res.created),
        ("last_modified", &res.last_modified),
        ("metadata_modified", &res.metadata_modified),
    ];
    for (field, value) in candidates {
        let Some(raw) = value.as_deref().filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        match parse_timestamp(raw) {
            Some(ts) => return ts,
            None => warn!(field, value = raw, name = ?res.name, "unparseable timestamp"),
        }
    }
    DateTime::<Utc>::UNIX_EPOCH
}

/// Newest `n` matching resources, preferred format first.
///
/// The sort is stable, so resources with equal timestamps keep catalog
/// order. Other formats are only considered when the preferred format
/// cannot fill the quota.
pub fn pick_latest(resources: &[Resource], n: usize, filter: &ResourceFilter) -> Vec<Resource> {
    let mut dated: Vec<(DateTime<Utc>, &Resource)> =
        resources.iter().map(|r| (resource_date(r), r)).collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let candidates: Vec<&Resource> = dated
        .into_iter()
        .map(|(_, r)| r)
        .filter(|r| filter.matches_name(r))
        .collect();

    let mut chosen: Vec<&Resource> = Vec::with_capacity(n);
    for res in candidates.iter().copied().filter(|r| filter.is_preferred(r)) {
        if chosen.len() >= n {
            break;
        }
        chosen.push(res);
    }

    if chosen.len() < n {
        for res in candidates {
            if chosen.len() >= n {
                break;
            }
            if !chosen.iter().any(|c| std::ptr::eq(*c, res)) {
                chosen.push(res);
            }
        }
    }

    chosen.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn res(name: &str, format: &str, created: Option<&str>) -> Resource {
        Resource {
            name: Some(name.to_string()),
            format: Some(format.to_string()),
            url: Some(format!("https://portal.example/{}", name)),
            created: created.map(str::to_string),
            ..Resource::default()
        }
    }

    fn epd_filter() -> ResourceFilter {
        ResourceFilter::new(&["epd".to_string(), "snomed".to_string()], "zip")
    }

    fn names(picked: &[Resource]) -> Vec<&str> {
        picked.iter().filter_map(|r| r.name.as_deref()).collect()
    }

    #[test]
    fn resource_date_falls_back_through_fields() {
        let mut r = res("x", "zip", None);
        assert_eq!(resource_date(&r), DateTime::<Utc>::UNIX_EPOCH);

        r.metadata_modified = Some("2024-02-01".to_string());
        assert_eq!(
            resource_date(&r),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );

        r.last_modified = Some("2024-03-01T12:30:00.123456".to_string());
        assert_eq!(
            resource_date(&r).date_naive(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );

        r.created = Some("2024-04-01T00:00:00+01:00".to_string());
        assert_eq!(
            resource_date(&r),
            Utc.with_ymd_and_hms(2024, 3, 31, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn unparseable_field_falls_through_to_next() {
        let mut r = res("x", "zip", Some("not a date"));
        r.last_modified = Some("2023-11-30T08:00:00".to_string());
        assert_eq!(
            resource_date(&r),
            Utc.with_ymd_and_hms(2023, 11, 30, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn preferred_format_fills_quota_before_others() {
        let resources = vec![
            res("EPD_SNOMED_A", "ZIP", Some("2024-01-15T00:00:00")),
            res("EPD_SNOMED_B", "CSV", Some("2024-03-15T00:00:00")),
            res("EPD_SNOMED_C", "zip", Some("2024-02-15T00:00:00")),
        ];
        let picked = pick_latest(&resources, 2, &epd_filter());
        assert_eq!(names(&picked), vec!["EPD_SNOMED_C", "EPD_SNOMED_A"]);
    }

    #[test]
    fn fallback_pass_only_runs_when_quota_unmet() {
        let resources = vec![
            res("EPD_SNOMED_A", "zip", Some("2024-01-15T00:00:00")),
            res("EPD_SNOMED_B", "csv", Some("2024-03-15T00:00:00")),
            res("EPD_SNOMED_C", "zip", Some("2024-02-15T00:00:00")),
        ];
        let picked = pick_latest(&resources, 3, &epd_filter());
        assert_eq!(
            names(&picked),
            vec!["EPD_SNOMED_C", "EPD_SNOMED_A", "EPD_SNOMED_B"]
        );
    }

    #[test]
    fn name_filter_needs_every_substring() {
        let resources = vec![
            res("EPD 202403", "zip", Some("2024-03-01")),
            res("SNOMED lookup", "zip", Some("2024-03-01")),
            res("epd_snomed_202402", "zip", Some("2024-02-01")),
        ];
        let picked = pick_latest(&resources, 3, &epd_filter());
        assert_eq!(names(&picked), vec!["epd_snomed_202402"]);
    }

    #[test]
    fn equal_timestamps_keep_catalog_order() {
        let resources = vec![
            res("EPD_SNOMED_1", "zip", None),
            res("EPD_SNOMED_2", "zip", None),
            res("EPD_SNOMED_3", "zip", None),
        ];
        let picked = pick_latest(&resources, 2, &epd_filter());
        assert_eq!(names(&picked), vec!["EPD_SNOMED_1", "EPD_SNOMED_2"]);
    }

    #[test]
    fn zero_quota_picks_nothing() {
        let resources = vec![res("EPD_SNOMED_1", "zip", None)];
        assert!(pick_latest(&resources, 0, &epd_filter()).is_empty());
    }
}
