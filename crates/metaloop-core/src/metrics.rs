//! Metrics-query port.
//!
//! The search-analytics client lives outside the core. The tracker needs
//! per-page metrics; candidate baselines come from the site-wide query.

use chrono::NaiveDate;

use metaloop_types::error::MetricsError;
use metaloop_types::tracking::{PageMetrics, PageMetricsRow};

/// Source of click-through metrics for a site.
pub trait MetricsSource: Send + Sync {
    /// Aggregated metrics for one page over `[start, end]`, or `None` when
    /// the source has no rows for that page.
    fn query_by_page(
        &self,
        site: &str,
        page_url: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Option<PageMetrics>, MetricsError>> + Send;

    /// Aggregated metrics for every page with data over `[start, end]`.
    fn query_all(
        &self,
        site: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Vec<PageMetricsRow>, MetricsError>> + Send;
}
