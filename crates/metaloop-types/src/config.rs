//! Configuration types for metaloop.
//!
//! `LoopConfig` represents `metaloop.toml`. Every field has a default, so an
//! empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration for one flywheel installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Site root used to build page URLs and as the metrics property.
    #[serde(default)]
    pub site: String,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub learner: LearnerConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub model: String,
    /// Total attempts per candidate before giving up.
    pub max_retries: u32,
    pub min_length: usize,
    pub max_length: usize,
    /// Minimum quality score (1-10) for acceptance.
    pub quality_threshold: f64,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_retries: 3,
            min_length: 140,
            max_length: 160,
            quality_threshold: 7.0,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Records younger than this many days are skipped.
    pub min_days: i64,
    /// Trailing window for fresh metrics.
    pub window_days: i64,
    pub min_impressions: u64,
    /// Maximum concurrent metrics fetches.
    pub concurrency: usize,
    /// Relative improvement strictly above which a page is a high performer.
    pub improvement_threshold: f64,
    /// Absolute click rate for `High CTR` when no baseline exists.
    pub absolute_high_ctr: f64,
    /// Absolute click rate for `Improved` when no baseline exists.
    pub absolute_improved_ctr: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_days: 7,
            window_days: 30,
            min_impressions: 10,
            concurrency: 5,
            improvement_threshold: 0.20,
            absolute_high_ctr: 0.05,
            absolute_improved_ctr: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub model: String,
    /// Minimum `High CTR` outcomes in the lookback window.
    pub min_high_performers: usize,
    pub lookback_days: i64,
    pub page_size: usize,
    /// Examples of each category embedded in the analysis prompt.
    pub examples_per_category: usize,
    pub max_tokens: u32,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            min_high_performers: 5,
            lookback_days: 30,
            page_size: 100,
            examples_per_category: 10,
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub prompts_dir: String,
    pub output: String,
    pub outcomes: String,
    pub metrics: String,
    pub candidates: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prompts_dir: "prompts".to_string(),
            output: "output/descriptions.json".to_string(),
            outcomes: "output/outcomes.jsonl".to_string(),
            metrics: "data/metrics.json".to_string(),
            candidates: "data/candidates.json".to_string(),
        }
    }
}
