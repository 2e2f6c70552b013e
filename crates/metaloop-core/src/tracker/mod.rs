//! Outcome classification for previously generated pages.
//!
//! Metrics for distinct records are fetched with bounded parallelism;
//! classification and audit emission happen afterwards, in record order.

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt, TryStreamExt};

use metaloop_types::audit::{AuditEvent, TrackerEvent};
use metaloop_types::config::TrackerConfig;
use metaloop_types::error::TrackerError;
use metaloop_types::tracking::{
    ClassifiedOutcome, OutcomeCategory, PageMetrics, TrackedRecord, TrackingSummary,
};

use crate::audit::AuditLog;
use crate::metrics::MetricsSource;

/// Tolerance for the relative-improvement comparisons.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Everything one tracker run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingReport {
    pub summary: TrackingSummary,
    pub outcomes: Vec<ClassifiedOutcome>,
}

pub struct Tracker<M: MetricsSource> {
    metrics: M,
    audit: AuditLog,
    config: TrackerConfig,
    site: String,
}

impl<M: MetricsSource> Tracker<M> {
    pub fn new(metrics: M, audit: AuditLog, config: TrackerConfig, site: impl Into<String>) -> Self {
        Self {
            metrics,
            audit,
            config,
            site: site.into(),
        }
    }

    /// Classify every record at least `min_days` old.
    ///
    /// The first metrics error aborts the run; nothing is audited for a
    /// run that fails.
    #[tracing::instrument(name = "track_outcomes", skip(self, records), fields(records = records.len()))]
    pub async fn run(
        &self,
        records: &[TrackedRecord],
        now: DateTime<Utc>,
    ) -> Result<TrackingReport, TrackerError> {
        let cutoff = now - Duration::days(self.config.min_days);
        let (eligible, too_recent): (Vec<&TrackedRecord>, Vec<&TrackedRecord>) =
            records.iter().partition(|r| r.generated_at <= cutoff);

        let end = now.date_naive();
        let start = (now - Duration::days(self.config.window_days)).date_naive();

        let fetched: Vec<(&TrackedRecord, Option<PageMetrics>)> = stream::iter(eligible)
            .map(|record| async move {
                let metrics = self
                    .metrics
                    .query_by_page(&self.site, &record.url, start, end)
                    .await
                    .map_err(|source| TrackerError::Metrics {
                        page: record.path.clone(),
                        source,
                    })?;
                Ok::<_, TrackerError>((record, metrics))
            })
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        let mut report = TrackingReport {
            summary: TrackingSummary {
                too_recent: too_recent.len(),
                ..TrackingSummary::default()
            },
            outcomes: Vec::with_capacity(fetched.len()),
        };

        for (record, metrics) in fetched {
            let outcome = classify(record, metrics.as_ref(), &self.config);
            match outcome.category {
                OutcomeCategory::InsufficientData => report.summary.insufficient_data += 1,
                OutcomeCategory::HighCtr => {
                    report.summary.tracked += 1;
                    report.summary.high_performers += 1;
                }
                OutcomeCategory::Improved | OutcomeCategory::NoImprovement => {
                    report.summary.tracked += 1;
                }
            }
            tracing::debug!(
                page = %record.path,
                category = %outcome.category,
                improvement = %outcome.improvement_pct(),
                "classified"
            );
            self.audit
                .record(&record.path, AuditEvent::Tracker(TrackerEvent::from(&outcome)))
                .await;
            report.outcomes.push(outcome);
        }

        tracing::info!(
            tracked = report.summary.tracked,
            high_performers = report.summary.high_performers,
            insufficient_data = report.summary.insufficient_data,
            too_recent = report.summary.too_recent,
            "tracking complete"
        );
        Ok(report)
    }
}

/// Pure classification of one record against its fresh metrics.
pub fn classify(
    record: &TrackedRecord,
    metrics: Option<&PageMetrics>,
    config: &TrackerConfig,
) -> ClassifiedOutcome {
    let baseline_ctr = record.baseline.and_then(|b| b.usable_ctr());
    let mut outcome = ClassifiedOutcome {
        path: record.path.clone(),
        title: record.title.clone(),
        description: record.description.clone(),
        category: OutcomeCategory::InsufficientData,
        current_ctr: metrics.map(|m| m.ctr),
        baseline_ctr,
        improvement: None,
        impressions: metrics.map_or(0, |m| m.impressions),
    };

    let Some(metrics) = metrics.filter(|m| m.impressions >= config.min_impressions) else {
        return outcome;
    };

    outcome.category = match baseline_ctr {
        Some(baseline) => {
            let improvement = (metrics.ctr - baseline) / baseline;
            outcome.improvement = Some(improvement);
            if improvement > config.improvement_threshold + BOUNDARY_EPSILON {
                OutcomeCategory::HighCtr
            } else if improvement > BOUNDARY_EPSILON {
                OutcomeCategory::Improved
            } else {
                OutcomeCategory::NoImprovement
            }
        }
        None => {
            if metrics.ctr >= config.absolute_high_ctr {
                OutcomeCategory::HighCtr
            } else if metrics.ctr >= config.absolute_improved_ctr {
                OutcomeCategory::Improved
            } else {
                OutcomeCategory::NoImprovement
            }
        }
    };
    outcome
}
