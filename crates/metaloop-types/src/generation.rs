//! Generator data shapes: candidate text, validation results, attempts, and
//! terminal outcomes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::candidate::Baseline;

/// Attribute bag attached to a validation result.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Structured LLM output for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedText {
    pub title: String,
    pub description: String,
}

/// Verdict of a single validator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: Meta,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            pass: true,
            reason: None,
            meta: Meta::new(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            pass: false,
            reason: Some(reason.into()),
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

/// One rejected retry iteration.
///
/// `attempt == 0` marks a transport failure that never produced text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<GeneratedText>,
    pub reason: String,
}

/// Rejections accumulated for one candidate, in attempt order.
pub type FailureHistory = Vec<Attempt>;

/// Accepted text for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSuccess {
    pub title: String,
    pub description: String,
    pub generated_at: DateTime<Utc>,
    pub baseline: Baseline,
    /// Number of attempts it took, starting at 1.
    pub attempts: u32,
    /// Merged validator metadata (e.g. `qualityScore`).
    #[serde(default)]
    pub meta: Meta,
}

/// Candidate that could not be generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    /// Attempts consumed. Zero for a transport failure.
    pub attempts: u32,
    pub last_reason: String,
    pub history: FailureHistory,
    pub failed_at: DateTime<Utc>,
}

/// Terminal state of one candidate's processing. Exactly one per candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success(GenerationSuccess),
    Failure(GenerationFailure),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }
}

/// Success or failure keyed by the page path.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome<T> {
    pub path: String,
    pub outcome: T,
}

/// Everything one generator batch produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub results: Vec<PageOutcome<GenerationSuccess>>,
    pub failures: Vec<PageOutcome<GenerationFailure>>,
}

impl BatchResult {
    pub fn push(&mut self, path: String, outcome: GenerationOutcome) {
        match outcome {
            GenerationOutcome::Success(success) => self.results.push(PageOutcome {
                path,
                outcome: success,
            }),
            GenerationOutcome::Failure(failure) => self.failures.push(PageOutcome {
                path,
                outcome: failure,
            }),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_result_builders() {
        let ok = ValidationResult::pass().with_meta("qualityScore", serde_json::json!(8));
        assert!(ok.pass);
        assert_eq!(ok.meta["qualityScore"], 8);

        let bad = ValidationResult::fail("too short");
        assert!(!bad.pass);
        assert_eq!(bad.reason.as_deref(), Some("too short"));
    }

    #[test]
    fn test_batch_result_splits_outcomes() {
        let mut batch = BatchResult::default();
        batch.push(
            "/a".to_string(),
            GenerationOutcome::Failure(GenerationFailure {
                attempts: 0,
                last_reason: "rate limited".to_string(),
                history: vec![Attempt {
                    attempt: 0,
                    generated: None,
                    reason: "rate limited".to_string(),
                }],
                failed_at: Utc::now(),
            }),
        );
        assert_eq!(batch.succeeded(), 0);
        assert_eq!(batch.failed(), 1);
        assert_eq!(batch.failures[0].path, "/a");
    }

    #[test]
    fn test_generated_text_schema_has_both_fields() {
        let schema = schemars::schema_for!(GeneratedText);
        let value = serde_json::to_value(schema).unwrap();
        let required = value["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "title"));
        assert!(required.iter().any(|v| v == "description"));
    }
}
