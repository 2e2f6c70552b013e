//! Batch output artifact: the durable link between one cycle's generator
//! output and the next cycle's tracker input.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::{Baseline, page_url};
use crate::generation::{Attempt, GenerationOutcome};
use crate::tracking::TrackedRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEntry {
    pub title: String,
    pub description: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Baseline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNote {
    pub attempt: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    /// Always `true`; distinguishes failures from successes on disk.
    pub failed: bool,
    pub failed_at: DateTime<Utc>,
    pub run_id: String,
    pub attempts: u32,
    pub last_reason: String,
    pub failures: Vec<FailureNote>,
}

/// One page's latest terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactEntry {
    Failure(FailureEntry),
    Success(SuccessEntry),
}

impl ArtifactEntry {
    pub fn from_outcome(outcome: &GenerationOutcome, run_id: &str) -> Self {
        match outcome {
            GenerationOutcome::Success(s) => ArtifactEntry::Success(SuccessEntry {
                title: s.title.clone(),
                description: s.description.clone(),
                generated_at: s.generated_at,
                run_id: run_id.to_string(),
                baseline: Some(s.baseline),
            }),
            GenerationOutcome::Failure(f) => ArtifactEntry::Failure(FailureEntry {
                failed: true,
                failed_at: f.failed_at,
                run_id: run_id.to_string(),
                attempts: f.attempts,
                last_reason: f.last_reason.clone(),
                failures: f
                    .history
                    .iter()
                    .map(|a| FailureNote {
                        attempt: a.attempt,
                        reason: a.reason.clone(),
                    })
                    .collect(),
            }),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ArtifactEntry::Failure(f) if f.failed)
    }
}

/// Mapping from page path to its latest outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchArtifact {
    pub entries: BTreeMap<String, ArtifactEntry>,
}

impl BatchArtifact {
    /// Record a terminal outcome, replacing any earlier entry for the path.
    pub fn record_outcome(&mut self, path: &str, outcome: &GenerationOutcome, run_id: &str) {
        self.entries
            .insert(path.to_string(), ArtifactEntry::from_outcome(outcome, run_id));
    }

    /// Successful entries as tracker input. Failures are never tracked.
    pub fn tracked_records(&self, site: &str) -> Vec<TrackedRecord> {
        self.entries
            .iter()
            .filter_map(|(path, entry)| match entry {
                ArtifactEntry::Success(s) => Some(TrackedRecord {
                    path: path.clone(),
                    url: page_url(site, path),
                    title: s.title.clone(),
                    description: s.description.clone(),
                    run_id: s.run_id.clone(),
                    generated_at: s.generated_at,
                    baseline: s.baseline,
                }),
                ArtifactEntry::Failure(_) => None,
            })
            .collect()
    }

    /// Rejections from an earlier failed run for `path`, if any.
    pub fn prior_failures(&self, path: &str) -> Vec<Attempt> {
        match self.entries.get(path) {
            Some(ArtifactEntry::Failure(f)) => f
                .failures
                .iter()
                .map(|note| Attempt {
                    attempt: note.attempt,
                    generated: None,
                    reason: note.reason.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_failed()).count()
    }
}
