//! Tracker data shapes: tracked records, observed metrics, and
//! classified outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::candidate::Baseline;

/// Aggregated search metrics for a single page over a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub ctr: f64,
    pub impressions: u64,
    pub clicks: u64,
}

/// One row of a site-wide metrics query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetricsRow {
    pub page_url: String,
    pub ctr: f64,
    pub impressions: u64,
}

/// A previously generated success, waiting to be measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedRecord {
    pub path: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Baseline>,
}

/// Classification of a tracked record against fresh metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeCategory {
    #[serde(rename = "High CTR")]
    HighCtr,
    #[serde(rename = "Improved")]
    Improved,
    #[serde(rename = "No Improvement")]
    NoImprovement,
    #[serde(rename = "Insufficient Data")]
    InsufficientData,
}

impl OutcomeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCategory::HighCtr => "High CTR",
            OutcomeCategory::Improved => "Improved",
            OutcomeCategory::NoImprovement => "No Improvement",
            OutcomeCategory::InsufficientData => "Insufficient Data",
        }
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "High CTR" => Ok(OutcomeCategory::HighCtr),
            "Improved" => Ok(OutcomeCategory::Improved),
            "No Improvement" => Ok(OutcomeCategory::NoImprovement),
            "Insufficient Data" => Ok(OutcomeCategory::InsufficientData),
            other => Err(format!("invalid outcome category: '{other}'")),
        }
    }
}

/// Tracker output for one record. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedOutcome {
    pub path: String,
    pub title: String,
    pub description: String,
    pub category: OutcomeCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ctr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_ctr: Option<f64>,
    /// Relative improvement over baseline, when a baseline exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement: Option<f64>,
    pub impressions: u64,
}

impl ClassifiedOutcome {
    /// Improvement as a signed percentage string, e.g. `+23.5%`.
    pub fn improvement_pct(&self) -> String {
        match self.improvement {
            Some(value) => format!("{:+.1}%", value * 100.0),
            None => "n/a".to_string(),
        }
    }
}

/// Totals returned by one tracker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSummary {
    /// Classified records, excluding `Insufficient Data`.
    pub tracked: usize,
    pub high_performers: usize,
    pub insufficient_data: usize,
    /// Records younger than the minimum age, not classified at all.
    pub too_recent: usize,
}
