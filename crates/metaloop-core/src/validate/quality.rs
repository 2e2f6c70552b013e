//! LLM-scored quality check.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use metaloop_types::audit::{AuditEvent, ValidatorEvent};
use metaloop_types::candidate::Candidate;
use metaloop_types::generation::{GeneratedText, ValidationResult};
use metaloop_types::llm::{CompletionRequest, LlmError, Message};

use super::{ValidationContext, Validator};
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::structured::complete_structured;

/// Phrases the rubric penalises explicitly.
pub const BANNED_PHRASES: &[&str] = &[
    "learn more",
    "click here",
    "discover",
    "unlock",
    "look no further",
    "in today's world",
    "comprehensive guide",
    "everything you need to know",
    "one-stop shop",
    "best-in-class",
];

const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 10.0;

/// Structured verdict returned by the scoring call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QualityVerdict {
    /// 1 (unusable) to 10 (excellent).
    pub score: f64,
    /// One or two sentences explaining the score.
    pub feedback: String,
}

/// Asks an LLM to score the description against a fixed rubric.
pub struct QualityValidator {
    provider: Arc<BoxLlmProvider>,
    model: String,
    threshold: f64,
}

impl QualityValidator {
    pub fn new(provider: Arc<BoxLlmProvider>, model: impl Into<String>, threshold: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            threshold,
        }
    }

    fn request(&self, generated: &GeneratedText, candidate: &Candidate) -> CompletionRequest {
        let user = format!(
            "Page: {url}\nTitle: {title}\nDescription: {description}\n\nScore this description.",
            url = candidate.url,
            title = generated.title,
            description = generated.description,
        );
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(user)],
            system: Some(rubric()),
            max_tokens: 512,
            temperature: Some(0.0),
            output_config: None,
        }
    }
}

/// Scoring rubric sent as the system prompt.
pub fn rubric() -> String {
    let banned = BANNED_PHRASES
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You review meta descriptions for search results. Score the description from 1 to 10.\n\n\
         Rubric:\n\
         - Specificity: names concrete features, numbers, or outcomes from the page.\n\
         - Differentiation: says why this page beats the other results for the same query.\n\
         - Clarity: one clear idea, readable at a glance, matches the title.\n\
         - Filler: subtract at least 2 points for each of these phrases: {banned}.\n\n\
         A generic description that could describe any page scores 4 or lower.\n\
         Return the score and one or two sentences of feedback."
    )
}

impl Validator for QualityValidator {
    fn name(&self) -> &str {
        "quality"
    }

    async fn validate(
        &self,
        generated: &GeneratedText,
        candidate: &Candidate,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidationResult, LlmError> {
        let verdict: QualityVerdict = complete_structured(
            &self.provider,
            self.request(generated, candidate),
            "QualityVerdict",
        )
        .await?;
        if !(MIN_SCORE..=MAX_SCORE).contains(&verdict.score) {
            return Err(LlmError::SchemaViolation {
                schema: "QualityVerdict".to_string(),
                message: format!(
                    "score {} outside {MIN_SCORE}..={MAX_SCORE}",
                    verdict.score
                ),
            });
        }

        let passed = verdict.score >= self.threshold;
        tracing::debug!(
            page = %candidate.url,
            attempt = ctx.attempt,
            score = verdict.score,
            threshold = self.threshold,
            passed,
            "quality scored"
        );

        let event = if passed {
            ValidatorEvent::QualityPassed {
                attempt: ctx.attempt,
                score: verdict.score,
                threshold: self.threshold,
                feedback: verdict.feedback.clone(),
            }
        } else {
            ValidatorEvent::QualityFailed {
                attempt: ctx.attempt,
                score: verdict.score,
                threshold: self.threshold,
                feedback: verdict.feedback.clone(),
            }
        };
        ctx.audit.record(&candidate.path, AuditEvent::Validator(event)).await;

        if passed {
            Ok(ValidationResult::pass()
                .with_meta("qualityScore", serde_json::json!(verdict.score))
                .with_meta("qualityFeedback", serde_json::json!(verdict.feedback)))
        } else {
            Ok(ValidationResult::fail(format!(
                "Quality score {} below threshold {}: {}",
                verdict.score, self.threshold, verdict.feedback
            )))
        }
    }
}
