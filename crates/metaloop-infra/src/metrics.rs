//! Metrics source backed by an exported snapshot file.
//!
//! The file is a JSON array of per-day rows as exported from search
//! analytics:
//!
//! ```json
//! [{"date": "2026-10-01", "page": "https://example.com/pricing", "clicks": 12, "impressions": 480}]
//! ```
//!
//! Queries aggregate clicks and impressions over the inclusive date range.
//! A snapshot that failed to load can still be handed to the phases as an
//! unavailable source; each query then fails with the load error.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use metaloop_core::metrics::MetricsSource;
use metaloop_types::error::MetricsError;
use metaloop_types::tracking::{PageMetrics, PageMetricsRow};

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRow {
    pub date: NaiveDate,
    pub page: String,
    pub clicks: u64,
    pub impressions: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotMetricsSource {
    rows: Vec<SnapshotRow>,
    load_error: Option<String>,
}

impl SnapshotMetricsSource {
    pub fn new(rows: Vec<SnapshotRow>) -> Self {
        Self {
            rows,
            load_error: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            load_error: Some(reason.into()),
        }
    }

    pub async fn open(path: &Path) -> Result<Self, MetricsError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MetricsError::Unavailable(format!("{}: {e}", path.display())))?;
        let rows: Vec<SnapshotRow> = serde_json::from_str(&content)
            .map_err(|e| MetricsError::InvalidData(format!("{}: {e}", path.display())))?;
        tracing::debug!(rows = rows.len(), path = %path.display(), "loaded metrics snapshot");
        Ok(Self::new(rows))
    }

    /// Like [`open`](Self::open), but a missing or corrupt file yields an
    /// unavailable source instead of an error.
    pub async fn open_or_unavailable(path: &Path) -> Self {
        match Self::open(path).await {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("{e}");
                match e {
                    MetricsError::Unavailable(m) | MetricsError::InvalidData(m) => Self::unavailable(m),
                }
            }
        }
    }

    /// Why the snapshot could not be loaded, if it could not.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    fn ensure_loaded(&self) -> Result<(), MetricsError> {
        match &self.load_error {
            Some(reason) => Err(MetricsError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn in_range<'a>(
        &'a self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = &'a SnapshotRow> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.date >= start && r.date <= end)
    }
}

#[derive(Default)]
struct Totals {
    clicks: u64,
    impressions: u64,
}

impl Totals {
    fn add(&mut self, row: &SnapshotRow) {
        self.clicks += row.clicks;
        self.impressions += row.impressions;
    }

    fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }
}

impl MetricsSource for SnapshotMetricsSource {
    async fn query_by_page(
        &self,
        _site: &str,
        page_url: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<PageMetrics>, MetricsError> {
        self.ensure_loaded()?;
        let mut totals = Totals::default();
        let mut seen = false;
        for row in self.in_range(start, end).filter(|r| r.page == page_url) {
            totals.add(row);
            seen = true;
        }
        Ok(seen.then(|| PageMetrics {
            ctr: totals.ctr(),
            impressions: totals.impressions,
            clicks: totals.clicks,
        }))
    }

    async fn query_all(
        &self,
        _site: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PageMetricsRow>, MetricsError> {
        self.ensure_loaded()?;
        let mut by_page: BTreeMap<&str, Totals> = BTreeMap::new();
        for row in self.in_range(start, end) {
            by_page.entry(row.page.as_str()).or_default().add(row);
        }
        Ok(by_page
            .into_iter()
            .map(|(page, totals)| PageMetricsRow {
                page_url: page.to_string(),
                ctr: totals.ctr(),
                impressions: totals.impressions,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn row(day: &str, page: &str, clicks: u64, impressions: u64) -> SnapshotRow {
        SnapshotRow {
            date: date(day),
            page: page.to_string(),
            clicks,
            impressions,
        }
    }

    fn source() -> SnapshotMetricsSource {
        SnapshotMetricsSource::new(vec![
            row("2026-09-30", "https://ex.com/a", 100, 100),
            row("2026-10-01", "https://ex.com/a", 2, 50),
            row("2026-10-10", "https://ex.com/a", 3, 50),
            row("2026-10-05", "https://ex.com/b", 0, 40),
        ])
    }

    #[tokio::test]
    async fn test_query_by_page_aggregates_inclusive_range() {
        let metrics = source()
            .query_by_page("site", "https://ex.com/a", date("2026-10-01"), date("2026-10-10"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metrics.clicks, 5);
        assert_eq!(metrics.impressions, 100);
        assert!((metrics.ctr - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_query_by_page_unknown_page_is_none() {
        let metrics = source()
            .query_by_page("site", "https://ex.com/zzz", date("2026-10-01"), date("2026-10-10"))
            .await
            .unwrap();
        assert!(metrics.is_none());
    }

    #[tokio::test]
    async fn test_query_all_groups_by_page() {
        let rows = source()
            .query_all("site", date("2026-10-01"), date("2026-10-31"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].page_url, "https://ex.com/a");
        assert_eq!(rows[0].impressions, 100);
        assert_eq!(rows[1].ctr, 0.0);
    }

    #[tokio::test]
    async fn test_open_reads_json_and_reports_bad_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("metrics.json");
        tokio::fs::write(
            &path,
            r#"[{"date": "2026-10-01", "page": "https://ex.com/a", "clicks": 1, "impressions": 20}]"#,
        )
        .await
        .unwrap();
        let source = SnapshotMetricsSource::open(&path).await.unwrap();
        assert_eq!(source.rows.len(), 1);

        tokio::fs::write(&path, "{").await.unwrap();
        assert!(matches!(
            SnapshotMetricsSource::open(&path).await,
            Err(MetricsError::InvalidData(_))
        ));
        assert!(matches!(
            SnapshotMetricsSource::open(&tmp.path().join("missing.json")).await,
            Err(MetricsError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unloadable_snapshot_fails_every_query() {
        let tmp = TempDir::new().unwrap();
        let unloaded = SnapshotMetricsSource::open_or_unavailable(&tmp.path().join("missing.json")).await;
        assert!(unloaded.load_error().unwrap().contains("missing.json"));

        let by_page = unloaded
            .query_by_page("site", "https://ex.com/a", date("2026-10-01"), date("2026-10-10"))
            .await;
        assert!(matches!(by_page, Err(MetricsError::Unavailable(ref m)) if m.contains("missing.json")));
        assert!(matches!(
            unloaded.query_all("site", date("2026-10-01"), date("2026-10-10")).await,
            Err(MetricsError::Unavailable(_))
        ));

        assert!(source().load_error().is_none());
    }
}
