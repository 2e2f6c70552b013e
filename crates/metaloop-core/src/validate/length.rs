//! Description length check.

use metaloop_types::audit::{AuditEvent, ValidatorEvent};
use metaloop_types::candidate::Candidate;
use metaloop_types::generation::{GeneratedText, ValidationResult};
use metaloop_types::llm::LlmError;

use super::{ValidationContext, Validator};

/// Accepts descriptions whose character count lies in `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct LengthValidator {
    pub min: usize,
    pub max: usize,
}

impl LengthValidator {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Pure verdict, without the audit side effect.
    pub fn check(&self, description: &str) -> ValidationResult {
        let length = description.chars().count();
        if length < self.min {
            ValidationResult::fail(format!(
                "Description too short: {length} characters, minimum is {}",
                self.min
            ))
        } else if length > self.max {
            ValidationResult::fail(format!(
                "Description too long: {length} characters, maximum is {}",
                self.max
            ))
        } else {
            ValidationResult::pass().with_meta("descriptionLength", length.into())
        }
    }
}

impl Default for LengthValidator {
    fn default() -> Self {
        Self::new(140, 160)
    }
}

impl Validator for LengthValidator {
    fn name(&self) -> &str {
        "length"
    }

    async fn validate(
        &self,
        generated: &GeneratedText,
        candidate: &Candidate,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidationResult, LlmError> {
        let result = self.check(&generated.description);
        let length = generated.description.chars().count();
        let event = if result.pass {
            ValidatorEvent::LengthPassed {
                attempt: ctx.attempt,
                length,
                min: self.min,
                max: self.max,
            }
        } else {
            ValidatorEvent::LengthFailed {
                attempt: ctx.attempt,
                length,
                min: self.min,
                max: self.max,
            }
        };
        ctx.audit.record(&candidate.path, AuditEvent::Validator(event)).await;
        Ok(result)
    }
}
