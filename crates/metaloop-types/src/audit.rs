//! Audit events sent to the outcome store.
//!
//! Every phase emits a closed set of named categories, each with a fixed
//! attribute set. The store persists them as JSON:
//!
//! ```json
//! {"phase": "tracker", "event": {"category": "High CTR", "page": "/pricing", ...}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::generation::Attempt;
use crate::tracking::{ClassifiedOutcome, OutcomeCategory};

/// The flywheel phase that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Generator,
    Validator,
    Tracker,
    Learner,
}

/// Generator terminal events. Rejections are audited by the validators
/// themselves, so there is no separate "Validation Failed" event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum GeneratorEvent {
    #[serde(rename = "Generated")]
    Generated {
        title: String,
        description: String,
        attempts: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality_score: Option<f64>,
    },
    #[serde(rename = "Generation Failed")]
    GenerationFailed {
        attempts: u32,
        last_reason: String,
        failures: Vec<Attempt>,
    },
    #[serde(rename = "Generation Error")]
    GenerationError { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum ValidatorEvent {
    #[serde(rename = "Length Passed")]
    LengthPassed {
        attempt: u32,
        length: usize,
        min: usize,
        max: usize,
    },
    #[serde(rename = "Length Failed")]
    LengthFailed {
        attempt: u32,
        length: usize,
        min: usize,
        max: usize,
    },
    #[serde(rename = "Quality Passed")]
    QualityPassed {
        attempt: u32,
        score: f64,
        threshold: f64,
        feedback: String,
    },
    #[serde(rename = "Quality Failed")]
    QualityFailed {
        attempt: u32,
        score: f64,
        threshold: f64,
        feedback: String,
    },
}

/// Attributes shared by every tracker classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedAttributes {
    pub page: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ctr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_ctr: Option<f64>,
    /// Formatted relative improvement, e.g. `+23.5%`.
    pub improvement: String,
    pub impressions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum TrackerEvent {
    #[serde(rename = "High CTR")]
    HighCtr(TrackedAttributes),
    #[serde(rename = "Improved")]
    Improved(TrackedAttributes),
    #[serde(rename = "No Improvement")]
    NoImprovement(TrackedAttributes),
    #[serde(rename = "Insufficient Data")]
    InsufficientData(TrackedAttributes),
}

impl TrackerEvent {
    pub fn attributes(&self) -> &TrackedAttributes {
        match self {
            TrackerEvent::HighCtr(a)
            | TrackerEvent::Improved(a)
            | TrackerEvent::NoImprovement(a)
            | TrackerEvent::InsufficientData(a) => a,
        }
    }
}

impl From<&ClassifiedOutcome> for TrackerEvent {
    fn from(outcome: &ClassifiedOutcome) -> Self {
        let attrs = TrackedAttributes {
            page: outcome.path.clone(),
            title: outcome.title.clone(),
            description: outcome.description.clone(),
            current_ctr: outcome.current_ctr,
            baseline_ctr: outcome.baseline_ctr,
            improvement: outcome.improvement_pct(),
            impressions: outcome.impressions,
        };
        match outcome.category {
            OutcomeCategory::HighCtr => TrackerEvent::HighCtr(attrs),
            OutcomeCategory::Improved => TrackerEvent::Improved(attrs),
            OutcomeCategory::NoImprovement => TrackerEvent::NoImprovement(attrs),
            OutcomeCategory::InsufficientData => TrackerEvent::InsufficientData(attrs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category")]
pub enum LearnerEvent {
    #[serde(rename = "Insufficient Data")]
    InsufficientData {
        high_performers: usize,
        required: usize,
    },
    #[serde(rename = "Patterns Learned")]
    PatternsLearned {
        patterns: usize,
        high_performers: usize,
        low_performers: usize,
        generation_failures: usize,
        backup_key: String,
    },
}

/// Any event the flywheel records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Generator(GeneratorEvent),
    Validator(ValidatorEvent),
    Tracker(TrackerEvent),
    Learner(LearnerEvent),
}

/// Queryable category names. Tracker and learner both use the label
/// "Insufficient Data", so categories are distinguished by phase too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditCategory {
    Generated,
    GenerationFailed,
    GenerationError,
    LengthPassed,
    LengthFailed,
    QualityPassed,
    QualityFailed,
    HighCtr,
    Improved,
    NoImprovement,
    TrackerInsufficientData,
    LearnerInsufficientData,
    PatternsLearned,
}

impl AuditCategory {
    pub fn label(&self) -> &'static str {
        match self {
            AuditCategory::Generated => "Generated",
            AuditCategory::GenerationFailed => "Generation Failed",
            AuditCategory::GenerationError => "Generation Error",
            AuditCategory::LengthPassed => "Length Passed",
            AuditCategory::LengthFailed => "Length Failed",
            AuditCategory::QualityPassed => "Quality Passed",
            AuditCategory::QualityFailed => "Quality Failed",
            AuditCategory::HighCtr => "High CTR",
            AuditCategory::Improved => "Improved",
            AuditCategory::NoImprovement => "No Improvement",
            AuditCategory::TrackerInsufficientData | AuditCategory::LearnerInsufficientData => {
                "Insufficient Data"
            }
            AuditCategory::PatternsLearned => "Patterns Learned",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            AuditCategory::Generated
            | AuditCategory::GenerationFailed
            | AuditCategory::GenerationError => Phase::Generator,
            AuditCategory::LengthPassed
            | AuditCategory::LengthFailed
            | AuditCategory::QualityPassed
            | AuditCategory::QualityFailed => Phase::Validator,
            AuditCategory::HighCtr
            | AuditCategory::Improved
            | AuditCategory::NoImprovement
            | AuditCategory::TrackerInsufficientData => Phase::Tracker,
            AuditCategory::LearnerInsufficientData | AuditCategory::PatternsLearned => {
                Phase::Learner
            }
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<OutcomeCategory> for AuditCategory {
    fn from(category: OutcomeCategory) -> Self {
        match category {
            OutcomeCategory::HighCtr => AuditCategory::HighCtr,
            OutcomeCategory::Improved => AuditCategory::Improved,
            OutcomeCategory::NoImprovement => AuditCategory::NoImprovement,
            OutcomeCategory::InsufficientData => AuditCategory::TrackerInsufficientData,
        }
    }
}

impl AuditEvent {
    pub fn category(&self) -> AuditCategory {
        match self {
            AuditEvent::Generator(e) => match e {
                GeneratorEvent::Generated { .. } => AuditCategory::Generated,
                GeneratorEvent::GenerationFailed { .. } => AuditCategory::GenerationFailed,
                GeneratorEvent::GenerationError { .. } => AuditCategory::GenerationError,
            },
            AuditEvent::Validator(e) => match e {
                ValidatorEvent::LengthPassed { .. } => AuditCategory::LengthPassed,
                ValidatorEvent::LengthFailed { .. } => AuditCategory::LengthFailed,
                ValidatorEvent::QualityPassed { .. } => AuditCategory::QualityPassed,
                ValidatorEvent::QualityFailed { .. } => AuditCategory::QualityFailed,
            },
            AuditEvent::Tracker(e) => match e {
                TrackerEvent::HighCtr(_) => AuditCategory::HighCtr,
                TrackerEvent::Improved(_) => AuditCategory::Improved,
                TrackerEvent::NoImprovement(_) => AuditCategory::NoImprovement,
                TrackerEvent::InsufficientData(_) => AuditCategory::TrackerInsufficientData,
            },
            AuditEvent::Learner(e) => match e {
                LearnerEvent::InsufficientData { .. } => AuditCategory::LearnerInsufficientData,
                LearnerEvent::PatternsLearned { .. } => AuditCategory::PatternsLearned,
            },
        }
    }
}

/// A stored audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// Page path for per-page events, run id for run-level events.
    pub scope: String,
    pub recorded_at: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditRecord {
    pub fn new(scope: impl Into<String>, event: AuditEvent, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            scope: scope.into(),
            recorded_at,
            event,
        }
    }
}

/// One page of a category query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomePage {
    pub records: Vec<AuditRecord>,
    pub has_more: bool,
}
