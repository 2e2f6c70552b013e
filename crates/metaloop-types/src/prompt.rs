use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A learned correlation between description phrasing and click rate.
///
/// Patterns are append-only: a learning cycle adds new entries and never
/// rewrites earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub description: String,
    pub example: String,
    /// Observed click-rate multiplier, e.g. `1.4` for +40%.
    pub impact: f64,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    /// High performers considered when the pattern was learned.
    pub sample_size: usize,
    pub added_at: DateTime<Utc>,
}

/// Layered prompt configuration shared by the generator (reader) and the
/// learner (writer).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PromptState {
    /// Constraints text. Never modified by the flywheel.
    pub base: String,
    /// Quality guidance. Replaced wholesale by the learner.
    pub quality: String,
    pub patterns: Vec<Pattern>,
}

/// An archived copy of the quality layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityBackup {
    pub key: String,
    pub content: String,
}
