//! Validator chain.
//!
//! Validators run strictly in order and the first rejection stops the chain,
//! so the LLM-backed quality check never sees structurally invalid text.
//! On success the metadata of every validator is merged, later keys winning.

pub mod length;
pub mod quality;

use std::future::Future;
use std::pin::Pin;

use metaloop_types::candidate::Candidate;
use metaloop_types::generation::{GeneratedText, ValidationResult};
use metaloop_types::llm::LlmError;

use crate::audit::AuditLog;

pub use length::LengthValidator;
pub use quality::QualityValidator;

/// Per-attempt context handed to every validator.
pub struct ValidationContext<'a> {
    /// Attempt number, starting at 1.
    pub attempt: u32,
    pub audit: &'a AuditLog,
}

/// A single check on generated text.
///
/// `Err` is reserved for transport failures (an LLM-backed validator that
/// could not get a verdict). A rejection is `Ok` with `pass == false`.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(
        &self,
        generated: &GeneratedText,
        candidate: &Candidate,
        ctx: &ValidationContext<'_>,
    ) -> impl Future<Output = Result<ValidationResult, LlmError>> + Send;
}

/// Object-safe version of [`Validator`].
pub trait ValidatorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn validate_boxed<'a>(
        &'a self,
        generated: &'a GeneratedText,
        candidate: &'a Candidate,
        ctx: &'a ValidationContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ValidationResult, LlmError>> + Send + 'a>>;
}

impl<T: Validator> ValidatorDyn for T {
    fn name(&self) -> &str {
        Validator::name(self)
    }

    fn validate_boxed<'a>(
        &'a self,
        generated: &'a GeneratedText,
        candidate: &'a Candidate,
        ctx: &'a ValidationContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ValidationResult, LlmError>> + Send + 'a>> {
        Box::pin(self.validate(generated, candidate, ctx))
    }
}

/// Ordered list of validators.
#[derive(Default)]
pub struct ValidatorChain {
    validators: Vec<Box<dyn ValidatorDyn>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator; it runs after every validator already present.
    pub fn push<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub async fn run(
        &self,
        generated: &GeneratedText,
        candidate: &Candidate,
        ctx: &ValidationContext<'_>,
    ) -> Result<ValidationResult, LlmError> {
        let mut merged = ValidationResult::pass();
        for validator in &self.validators {
            let result = validator.validate_boxed(generated, candidate, ctx).await?;
            if !result.pass {
                tracing::debug!(
                    validator = validator.name(),
                    attempt = ctx.attempt,
                    reason = result.reason.as_deref().unwrap_or_default(),
                    "validator rejected candidate"
                );
                return Ok(ValidationResult {
                    pass: false,
                    reason: Some(
                        result
                            .reason
                            .unwrap_or_else(|| format!("rejected by {}", validator.name())),
                    ),
                    meta: Default::default(),
                });
            }
            merged.meta.extend(result.meta);
        }
        Ok(merged)
    }
}
