//! Per-candidate retry state machine.
//!
//! ```text
//! Attempting(1) -> Succeeded
//!               -> Attempting(n + 1)   rejected, n < max_retries
//!               -> Failed              rejected, n == max_retries
//!               -> Failed              transport error (attempts = 0)
//! ```
//!
//! Candidates are processed one after another so attempts and audit events
//! for a page stay in order.

pub mod prompt;

use std::sync::Arc;

use chrono::Utc;

use metaloop_types::audit::{AuditEvent, GeneratorEvent};
use metaloop_types::candidate::Candidate;
use metaloop_types::config::GeneratorConfig;
use metaloop_types::generation::{
    Attempt, BatchResult, GeneratedText, GenerationFailure, GenerationOutcome, GenerationSuccess,
};
use metaloop_types::llm::{CompletionRequest, LlmError, Message};
use metaloop_types::prompt::PromptState;

use crate::audit::AuditLog;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::structured::complete_structured;
use crate::service::prompt::render_system_prompt;
use crate::validate::{LengthValidator, QualityValidator, ValidationContext, ValidatorChain};

pub struct Generator {
    provider: Arc<BoxLlmProvider>,
    chain: ValidatorChain,
    audit: AuditLog,
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(
        provider: Arc<BoxLlmProvider>,
        chain: ValidatorChain,
        audit: AuditLog,
        config: GeneratorConfig,
    ) -> Self {
        if chain.is_empty() {
            tracing::warn!("validator chain is empty, every generated text will be accepted");
        } else {
            tracing::debug!(validators = chain.len(), "generator ready");
        }
        Self {
            provider,
            chain,
            audit,
            config,
        }
    }

    /// Generator with the standard chain: length, then LLM quality scoring.
    pub fn with_default_chain(
        provider: Arc<BoxLlmProvider>,
        audit: AuditLog,
        config: GeneratorConfig,
    ) -> Self {
        let chain = ValidatorChain::new()
            .push(LengthValidator::new(config.min_length, config.max_length))
            .push(QualityValidator::new(
                provider.clone(),
                config.model.clone(),
                config.quality_threshold,
            ));
        Self::new(provider, chain, audit, config)
    }

    /// Drive one candidate to exactly one terminal outcome.
    #[tracing::instrument(
        name = "generate_candidate",
        skip(self, candidate, prompt),
        fields(page = %candidate.url, max_retries = self.config.max_retries)
    )]
    pub async fn generate(&self, candidate: &Candidate, prompt: &PromptState) -> GenerationOutcome {
        let system = render_system_prompt(prompt);
        let max_retries = self.config.max_retries.max(1);
        let mut history: Vec<Attempt> = Vec::new();
        let mut attempt: u32 = 1;

        loop {
            let generated = match self.request_text(candidate, &system, &history).await {
                Ok(generated) => generated,
                Err(e) => return self.transport_failure(candidate, e).await,
            };

            let ctx = ValidationContext {
                attempt,
                audit: &self.audit,
            };
            let verdict = match self.chain.run(&generated, candidate, &ctx).await {
                Ok(verdict) => verdict,
                Err(e) => return self.transport_failure(candidate, e).await,
            };

            if verdict.pass {
                tracing::info!(attempt, "candidate accepted");
                let quality_score = verdict.meta.get("qualityScore").and_then(|v| v.as_f64());
                self.audit
                    .record(
                        &candidate.path,
                        AuditEvent::Generator(GeneratorEvent::Generated {
                            title: generated.title.clone(),
                            description: generated.description.clone(),
                            attempts: attempt,
                            quality_score,
                        }),
                    )
                    .await;
                return GenerationOutcome::Success(GenerationSuccess {
                    title: generated.title,
                    description: generated.description,
                    generated_at: Utc::now(),
                    baseline: candidate.baseline,
                    attempts: attempt,
                    meta: verdict.meta,
                });
            }

            let reason = verdict
                .reason
                .unwrap_or_else(|| "rejected without reason".to_string());
            tracing::info!(attempt, reason = %reason, "candidate rejected");
            history.push(Attempt {
                attempt,
                generated: Some(generated),
                reason,
            });

            if attempt >= max_retries {
                return self.exhausted(candidate, attempt, history).await;
            }
            attempt += 1;
        }
    }

    /// Process candidates in order. `on_outcome` sees each terminal outcome
    /// as soon as it exists, for incremental persistence.
    pub async fn run_batch<F>(
        &self,
        candidates: &[Candidate],
        prompt: &PromptState,
        mut on_outcome: F,
    ) -> BatchResult
    where
        F: FnMut(&Candidate, &GenerationOutcome),
    {
        let mut batch = BatchResult::default();
        for candidate in candidates {
            let outcome = self.generate(candidate, prompt).await;
            on_outcome(candidate, &outcome);
            batch.push(candidate.path.clone(), outcome);
        }
        tracing::info!(
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            "generation batch complete"
        );
        batch
    }

    async fn request_text(
        &self,
        candidate: &Candidate,
        system: &str,
        history: &[Attempt],
    ) -> Result<GeneratedText, LlmError> {
        let user = prompt::build_user_prompt(
            candidate,
            history,
            self.config.min_length,
            self.config.max_length,
        );
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message::user(user)],
            system: Some(system.to_string()),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            output_config: None,
        };
        complete_structured(&self.provider, request, "GeneratedText").await
    }

    async fn transport_failure(&self, candidate: &Candidate, error: LlmError) -> GenerationOutcome {
        let reason = error.to_string();
        tracing::warn!(page = %candidate.url, error = %reason, "generation aborted by transport error");
        self.audit
            .record(
                &candidate.path,
                AuditEvent::Generator(GeneratorEvent::GenerationError {
                    error: reason.clone(),
                }),
            )
            .await;
        GenerationOutcome::Failure(GenerationFailure {
            attempts: 0,
            last_reason: reason.clone(),
            history: vec![Attempt {
                attempt: 0,
                generated: None,
                reason,
            }],
            failed_at: Utc::now(),
        })
    }

    async fn exhausted(
        &self,
        candidate: &Candidate,
        attempts: u32,
        history: Vec<Attempt>,
    ) -> GenerationOutcome {
        let last_reason = history
            .last()
            .map(|a| a.reason.clone())
            .unwrap_or_default();
        tracing::warn!(page = %candidate.url, attempts, last_reason = %last_reason, "retries exhausted");
        self.audit
            .record(
                &candidate.path,
                AuditEvent::Generator(GeneratorEvent::GenerationFailed {
                    attempts,
                    last_reason: last_reason.clone(),
                    failures: history.clone(),
                }),
            )
            .await;
        GenerationOutcome::Failure(GenerationFailure {
            attempts,
            last_reason,
            history,
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use metaloop_types::audit::AuditCategory;
    use metaloop_types::candidate::Baseline;
    use serde_json::json;

    use crate::test_support::{MemoryOutcomeStore, ScriptedProvider};

    fn description(len: usize) -> String {
        "a".repeat(len)
    }

    fn text_reply(len: usize) -> String {
        json!({"title": "Pricing", "description": description(len)}).to_string()
    }

    fn candidate() -> Candidate {
        Candidate::new("https://ex.com", "/pricing", Baseline { ctr: 0.02, impressions: 900 })
    }

    fn length_only(provider: &ScriptedProvider, store: Arc<MemoryOutcomeStore>, max_retries: u32) -> Generator {
        let config = GeneratorConfig {
            max_retries,
            ..GeneratorConfig::default()
        };
        let chain = ValidatorChain::new().push(LengthValidator::new(config.min_length, config.max_length));
        Generator::new(Arc::new(provider.boxed()), chain, AuditLog::new(store), config)
    }

    #[tokio::test]
    async fn test_accepts_first_valid_attempt() {
        let provider = ScriptedProvider::new(|_, _| Ok(text_reply(150)));
        let store = Arc::new(MemoryOutcomeStore::default());
        let generator = length_only(&provider, store.clone(), 3);

        let outcome = generator.generate(&candidate(), &PromptState::default()).await;

        match outcome {
            GenerationOutcome::Success(s) => {
                assert_eq!(s.attempts, 1);
                assert_eq!(s.baseline.impressions, 900);
                assert_eq!(s.meta["descriptionLength"], 150);
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(
            store.categories(),
            vec![AuditCategory::LengthPassed, AuditCategory::Generated]
        );
    }

    #[tokio::test]
    async fn test_retry_replays_full_history() {
        let provider = ScriptedProvider::new(|_, i| Ok(text_reply([100, 170, 150][i])));
        let store = Arc::new(MemoryOutcomeStore::default());
        let generator = length_only(&provider, store, 3);

        let outcome = generator.generate(&candidate(), &PromptState::default()).await;
        assert!(outcome.is_success());

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        let third = &requests[2].messages[0].content;
        assert!(third.contains("Description too short: 100 characters"));
        assert!(third.contains("Description too long: 170 characters"));
        assert!(third.contains("fundamentally different"));
        assert!(!requests[0].messages[0].content.contains("Rejected because"));
    }

    #[tokio::test]
    async fn test_exhaustion_yields_single_failure() {
        let provider = ScriptedProvider::new(|_, _| Ok(text_reply(20)));
        let store = Arc::new(MemoryOutcomeStore::default());
        let generator = length_only(&provider, store.clone(), 3);

        let outcome = generator.generate(&candidate(), &PromptState::default()).await;

        match outcome {
            GenerationOutcome::Failure(f) => {
                assert_eq!(f.attempts, 3);
                assert_eq!(f.history.len(), 3);
                let indices: Vec<u32> = f.history.iter().map(|a| a.attempt).collect();
                assert_eq!(indices, vec![1, 2, 3]);
                assert_eq!(f.last_reason, f.history[2].reason);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 3);
        let categories = store.categories();
        assert_eq!(
            categories.iter().filter(|c| **c == AuditCategory::GenerationFailed).count(),
            1
        );
        assert!(!categories.contains(&AuditCategory::Generated));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_consume_attempts() {
        for max_retries in [1, 3, 7] {
            let provider = ScriptedProvider::new(|_, _| Err(LlmError::RateLimited { retry_after_ms: Some(1000) }));
            let store = Arc::new(MemoryOutcomeStore::default());
            let generator = length_only(&provider, store.clone(), max_retries);

            let outcome = generator.generate(&candidate(), &PromptState::default()).await;

            match outcome {
                GenerationOutcome::Failure(f) => {
                    assert_eq!(f.attempts, 0);
                    assert_eq!(f.history.len(), 1);
                    assert_eq!(f.history[0].attempt, 0);
                    assert!(f.last_reason.contains("rate limited"));
                }
                other => panic!("expected failure, got {other:?}"),
            }
            assert_eq!(provider.call_count(), 1);
            assert_eq!(store.categories(), vec![AuditCategory::GenerationError]);
        }
    }

    #[tokio::test]
    async fn test_schema_violation_is_transport_failure() {
        let provider = ScriptedProvider::new(|_, _| Ok(r#"{"title": "only a title"}"#.to_string()));
        let store = Arc::new(MemoryOutcomeStore::default());
        let generator = length_only(&provider, store, 3);

        let outcome = generator.generate(&candidate(), &PromptState::default()).await;
        match outcome {
            GenerationOutcome::Failure(f) => {
                assert_eq!(f.attempts, 0);
                assert!(f.last_reason.contains("GeneratedText"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_chain_skips_quality_on_length_failure() {
        // Calls: generate (too short), generate (ok), quality score.
        let provider = ScriptedProvider::new(|req, i| {
            if req.system.as_deref().unwrap_or_default().contains("Score the description") {
                return Ok(r#"{"score": 9, "feedback": "Concrete."}"#.to_string());
            }
            Ok(text_reply(if i == 0 { 50 } else { 150 }))
        });
        let store = Arc::new(MemoryOutcomeStore::default());
        let generator = Generator::with_default_chain(
            Arc::new(provider.boxed()),
            AuditLog::new(store.clone()),
            GeneratorConfig::default(),
        );

        let outcome = generator.generate(&candidate(), &PromptState::default()).await;

        match outcome {
            GenerationOutcome::Success(s) => {
                assert_eq!(s.attempts, 2);
                assert_eq!(s.meta["qualityScore"], 9.0);
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 3);
        assert_eq!(
            store.categories(),
            vec![
                AuditCategory::LengthFailed,
                AuditCategory::LengthPassed,
                AuditCategory::QualityPassed,
                AuditCategory::Generated,
            ]
        );
        match &store.records()[3].event {
            AuditEvent::Generator(GeneratorEvent::Generated { quality_score, .. }) => {
                assert_eq!(*quality_score, Some(9.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_isolates_failures_and_reports_each_outcome() {
        let provider = ScriptedProvider::new(|req, _| {
            if req.messages[0].content.contains("/broken") {
                Err(LlmError::Overloaded("busy".to_string()))
            } else {
                Ok(text_reply(145))
            }
        });
        let store = Arc::new(MemoryOutcomeStore::default());
        let generator = length_only(&provider, store, 3);
        let baseline = Baseline { ctr: 0.01, impressions: 100 };
        let candidates = vec![
            Candidate::new("https://ex.com", "/a", baseline),
            Candidate::new("https://ex.com", "/broken", baseline),
            Candidate::new("https://ex.com", "/c", baseline),
        ];

        let mut seen = Vec::new();
        let batch = generator
            .run_batch(&candidates, &PromptState::default(), |c, o| {
                seen.push((c.path.clone(), o.is_success()))
            })
            .await;

        assert_eq!(batch.succeeded(), 2);
        assert_eq!(batch.failed(), 1);
        assert_eq!(batch.failures[0].path, "/broken");
        assert_eq!(
            seen,
            vec![
                ("/a".to_string(), true),
                ("/broken".to_string(), false),
                ("/c".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_system_prompt_includes_prompt_state() {
        let provider = ScriptedProvider::new(|_, _| Ok(text_reply(150)));
        let store = Arc::new(MemoryOutcomeStore::default());
        let generator = length_only(&provider, store, 3);
        let state = PromptState {
            base: "BASE RULES".to_string(),
            quality: "QUALITY RULES".to_string(),
            patterns: Vec::new(),
        };

        generator.generate(&candidate(), &state).await;

        let system = provider.requests()[0].system.clone().unwrap();
        assert!(system.starts_with("BASE RULES"));
        assert!(system.contains("QUALITY RULES"));
    }
}
