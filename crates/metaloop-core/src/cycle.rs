//! Flywheel orchestration: tracker, then learner, then generator.
//!
//! A tracker or learner failure is reported and the cycle moves on; the
//! generator always runs with whatever prompt state is on disk.

use chrono::{DateTime, Utc};

use metaloop_types::candidate::Candidate;
use metaloop_types::generation::{BatchResult, GenerationOutcome};
use metaloop_types::tracking::TrackedRecord;

use crate::generator::Generator;
use crate::learner::Learner;
use crate::metrics::MetricsSource;
use crate::service::fs::FileSystem;
use crate::tracker::{Tracker, TrackingReport};

/// Result of one phase within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseResult<T> {
    Completed(T),
    Failed(String),
}

impl<T> PhaseResult<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            PhaseResult::Completed(value) => Some(value),
            PhaseResult::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseResult::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub tracking: PhaseResult<TrackingReport>,
    /// `Completed(None)` when the learner had too few high performers.
    pub learning: PhaseResult<Option<usize>>,
    pub generation: PhaseResult<BatchResult>,
}

pub struct Flywheel<M: MetricsSource, F: FileSystem> {
    tracker: Tracker<M>,
    learner: Learner<F>,
    generator: Generator,
}

impl<M: MetricsSource, F: FileSystem> Flywheel<M, F> {
    pub fn new(tracker: Tracker<M>, learner: Learner<F>, generator: Generator) -> Self {
        Self {
            tracker,
            learner,
            generator,
        }
    }

    /// Run all three phases in order. Callers must not run two cycles
    /// against the same prompt directory at once.
    #[tracing::instrument(
        name = "run_cycle",
        skip(self, tracked, candidates, on_outcome),
        fields(tracked = tracked.len(), candidates = candidates.len())
    )]
    pub async fn run_cycle<C>(
        &self,
        tracked: &[TrackedRecord],
        candidates: &[Candidate],
        now: DateTime<Utc>,
        on_outcome: C,
    ) -> CycleReport
    where
        C: FnMut(&Candidate, &GenerationOutcome),
    {
        let tracking = match self.tracker.run(tracked, now).await {
            Ok(report) => PhaseResult::Completed(report),
            Err(e) => {
                tracing::error!(error = %e, "tracker phase failed, continuing with stale outcomes");
                PhaseResult::Failed(e.to_string())
            }
        };

        let learning = match self.learner.learn(now).await {
            Ok(learned) => PhaseResult::Completed(learned),
            Err(e) => {
                tracing::error!(error = %e, "learner phase failed, continuing with current prompt");
                PhaseResult::Failed(e.to_string())
            }
        };

        let generation = match self.learner.prompt_service().load().await {
            Ok(state) => PhaseResult::Completed(
                self.generator
                    .run_batch(candidates, &state, on_outcome)
                    .await,
            ),
            Err(e) => {
                tracing::error!(error = %e, "could not load prompt state, skipping generation");
                PhaseResult::Failed(e.to_string())
            }
        };

        CycleReport {
            tracking,
            learning,
            generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use metaloop_types::candidate::Baseline;
    use metaloop_types::config::{GeneratorConfig, LearnerConfig, TrackerConfig};
    use serde_json::json;

    use crate::audit::AuditLog;
    use crate::service::prompt::PromptService;
    use crate::test_support::{MemoryFileSystem, MemoryMetrics, MemoryOutcomeStore, ScriptedProvider};
    use crate::validate::{LengthValidator, ValidatorChain};

    fn now() -> DateTime<Utc> {
        "2026-10-16T12:00:00Z".parse().unwrap()
    }

    fn tracked(path: &str) -> TrackedRecord {
        TrackedRecord {
            path: path.to_string(),
            url: format!("https://ex.com{path}"),
            title: format!("Title {path}"),
            description: format!("Description {path}"),
            run_id: "run-0".to_string(),
            generated_at: now() - Duration::days(10),
            baseline: Some(Baseline { ctr: 0.02, impressions: 500 }),
        }
    }

    fn flywheel(
        metrics: MemoryMetrics,
        provider: &ScriptedProvider,
        store: Arc<MemoryOutcomeStore>,
        fs: MemoryFileSystem,
    ) -> Flywheel<MemoryMetrics, MemoryFileSystem> {
        let audit = AuditLog::new(store);
        let provider = Arc::new(provider.boxed());
        let config = GeneratorConfig::default();
        let chain = ValidatorChain::new().push(LengthValidator::new(config.min_length, config.max_length));
        Flywheel::new(
            Tracker::new(metrics, audit.clone(), TrackerConfig::default(), "site"),
            Learner::new(
                provider.clone(),
                audit.clone(),
                PromptService::new(fs, "/prompts"),
                LearnerConfig::default(),
            ),
            Generator::new(provider, chain, audit, config),
        )
    }

    fn generated_reply() -> String {
        json!({"title": "New title", "description": "d".repeat(150)}).to_string()
    }

    #[tokio::test]
    async fn test_full_cycle_feeds_learned_prompt_to_generator() {
        let mut metrics = MemoryMetrics::default();
        let mut records = Vec::new();
        for i in 0..5 {
            let path = format!("/win{i}");
            metrics = metrics.with_page(&format!("https://ex.com{path}"), 0.04, 300);
            records.push(tracked(&path));
        }
        let provider = ScriptedProvider::new(|req, _| {
            let system = req.system.as_deref().unwrap_or_default();
            if system.contains("You analyse") {
                Ok(json!({
                    "patterns": [{"description": "Quote the price", "example": "$9/month", "impact": 1.5, "confidence": 0.7}],
                    "improvement_instructions": "Quote the price.",
                    "failure_insights": []
                })
                .to_string())
            } else if system.contains("quality-guidance section") {
                Ok("# Quality guidance\n\n- Quote the price.".to_string())
            } else {
                Ok(generated_reply())
            }
        });
        let store = Arc::new(MemoryOutcomeStore::default());
        let fly = flywheel(metrics, &provider, store, MemoryFileSystem::default());
        let candidates = vec![Candidate::new("https://ex.com", "/next", Baseline { ctr: 0.01, impressions: 80 })];

        let mut emitted = 0;
        let report = fly.run_cycle(&records, &candidates, now(), |_, _| emitted += 1).await;

        let tracking = report.tracking.completed().unwrap();
        assert_eq!(tracking.summary.high_performers, 5);
        assert_eq!(report.learning, PhaseResult::Completed(Some(1)));
        let generation = report.generation.completed().unwrap();
        assert_eq!(generation.succeeded(), 1);
        assert_eq!(emitted, 1);

        let generate_request = provider.requests().into_iter().last().unwrap();
        let system = generate_request.system.unwrap();
        assert!(system.contains("- Quote the price."));
        assert!(system.contains("# Learned patterns"));
    }

    #[tokio::test]
    async fn test_tracker_failure_does_not_stop_generation() {
        let metrics = MemoryMetrics::default().failing_on("https://ex.com/a");
        let provider = ScriptedProvider::new(|_, _| Ok(generated_reply()));
        let store = Arc::new(MemoryOutcomeStore::default());
        let fly = flywheel(metrics, &provider, store, MemoryFileSystem::default());
        let candidates = vec![Candidate::new("https://ex.com", "/next", Baseline { ctr: 0.01, impressions: 80 })];

        let report = fly.run_cycle(&[tracked("/a")], &candidates, now(), |_, _| {}).await;

        assert!(report.tracking.is_failed());
        assert_eq!(report.learning, PhaseResult::Completed(None));
        assert_eq!(report.generation.completed().map(|b| b.succeeded()), Some(1));
    }

    #[tokio::test]
    async fn test_learner_failure_does_not_stop_generation() {
        let provider = ScriptedProvider::new(|_, _| Ok(generated_reply()));
        let store = Arc::new(MemoryOutcomeStore::default());
        store.fail_queries(true);
        let fly = flywheel(MemoryMetrics::default(), &provider, store, MemoryFileSystem::default());
        let candidates = vec![Candidate::new("https://ex.com", "/next", Baseline { ctr: 0.01, impressions: 80 })];

        let report = fly.run_cycle(&[], &candidates, now(), |_, _| {}).await;

        assert_eq!(
            report.tracking.completed().map(|t| t.summary.tracked),
            Some(0)
        );
        assert!(report.learning.is_failed());
        assert_eq!(report.generation.completed().map(|b| b.succeeded()), Some(1));
    }
}
