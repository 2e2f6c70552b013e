//! Pattern mining and prompt mutation.
//!
//! Reads classified outcomes and generation failures from the outcome store,
//! asks an LLM for patterns and guidance, appends the patterns and rewrites
//! the quality layer. Below the high-performer floor it records
//! "Insufficient Data" and leaves the prompt files untouched.

pub mod prompt;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::Deserialize;

use metaloop_types::audit::{AuditCategory, AuditEvent, AuditRecord, LearnerEvent};
use metaloop_types::config::LearnerConfig;
use metaloop_types::error::LearnerError;
use metaloop_types::llm::{CompletionRequest, LlmError, Message};
use metaloop_types::prompt::Pattern;

use crate::audit::AuditLog;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::structured::complete_structured;
use crate::service::fs::FileSystem;
use crate::service::prompt::PromptService;

/// A pattern as returned by the analysis call, before stamping.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractedPattern {
    pub description: String,
    pub example: String,
    /// Click-through multiplier, 1.0 = no effect.
    pub impact: f64,
    /// 0.0 to 1.0.
    pub confidence: f64,
}

/// Structured reply of the analysis call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PatternAnalysis {
    pub patterns: Vec<ExtractedPattern>,
    pub improvement_instructions: String,
    #[serde(default)]
    pub failure_insights: Vec<String>,
}

pub struct Learner<F: FileSystem> {
    provider: Arc<BoxLlmProvider>,
    audit: AuditLog,
    prompts: PromptService<F>,
    config: LearnerConfig,
}

impl<F: FileSystem> Learner<F> {
    pub fn new(
        provider: Arc<BoxLlmProvider>,
        audit: AuditLog,
        prompts: PromptService<F>,
        config: LearnerConfig,
    ) -> Self {
        Self {
            provider,
            audit,
            prompts,
            config,
        }
    }

    pub fn prompt_service(&self) -> &PromptService<F> {
        &self.prompts
    }

    /// Run one learning pass.
    ///
    /// Returns the number of patterns learned, or `None` when there were
    /// too few high performers in the lookback window.
    #[tracing::instrument(name = "learn_patterns", skip(self))]
    pub async fn learn(&self, now: DateTime<Utc>) -> Result<Option<usize>, LearnerError> {
        let since = now - Duration::days(self.config.lookback_days);
        let page_size = self.config.page_size;

        let high = latest_per_scope(
            self.audit
                .query_all(AuditCategory::HighCtr, since, page_size)
                .await?,
        );
        if high.len() < self.config.min_high_performers {
            tracing::info!(
                high_performers = high.len(),
                required = self.config.min_high_performers,
                "not enough high performers to learn from"
            );
            self.audit
                .record(
                    &run_scope(now),
                    AuditEvent::Learner(LearnerEvent::InsufficientData {
                        high_performers: high.len(),
                        required: self.config.min_high_performers,
                    }),
                )
                .await;
            return Ok(None);
        }

        let (low, failures) = tokio::try_join!(
            self.audit
                .query_all(AuditCategory::NoImprovement, since, page_size),
            self.audit
                .query_all(AuditCategory::GenerationFailed, since, page_size),
        )?;
        let (low, failures) = (latest_per_scope(low), latest_per_scope(failures));
        tracing::info!(
            high_performers = high.len(),
            low_performers = low.len(),
            generation_failures = failures.len(),
            "analysing outcomes"
        );

        let analysis_request = CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message::user(prompt::build_analysis_prompt(
                &high,
                &low,
                &failures,
                self.config.examples_per_category,
            ))],
            system: Some(prompt::ANALYSIS_SYSTEM_PROMPT.to_string()),
            max_tokens: self.config.max_tokens,
            temperature: Some(0.2),
            output_config: None,
        };
        let analysis: PatternAnalysis =
            complete_structured(&self.provider, analysis_request, "PatternAnalysis").await?;

        let patterns: Vec<Pattern> = analysis
            .patterns
            .into_iter()
            .map(|p| Pattern {
                description: p.description,
                example: p.example,
                impact: p.impact,
                confidence: p.confidence.clamp(0.0, 1.0),
                sample_size: high.len(),
                added_at: now,
            })
            .collect();
        self.prompts.append_patterns(&patterns).await?;

        let state = self.prompts.load().await?;
        let insights = if failures.is_empty() {
            &[][..]
        } else {
            &analysis.failure_insights[..]
        };
        let rewrite_request = CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message::user(prompt::build_rewrite_prompt(
                &state.quality,
                &analysis.improvement_instructions,
                insights,
            ))],
            system: Some(prompt::REWRITE_SYSTEM_PROMPT.to_string()),
            max_tokens: self.config.max_tokens,
            temperature: Some(0.2),
            output_config: None,
        };
        let response = self.provider.complete(&rewrite_request).await?;
        let rewritten = strip_markdown_fence(&response.content);
        if rewritten.is_empty() {
            return Err(LlmError::Provider {
                message: "quality rewrite returned no content".to_string(),
            }
            .into());
        }

        let backup_key = self.prompts.update_quality_prompt(rewritten, now).await?;

        self.audit
            .record(
                &run_scope(now),
                AuditEvent::Learner(LearnerEvent::PatternsLearned {
                    patterns: patterns.len(),
                    high_performers: high.len(),
                    low_performers: low.len(),
                    generation_failures: failures.len(),
                    backup_key: backup_key.clone(),
                }),
            )
            .await;
        tracing::info!(patterns = patterns.len(), backup = %backup_key, "patterns learned");
        Ok(Some(patterns.len()))
    }
}

/// Keep the most recent record per scope (page), oldest first.
///
/// Every tracker run re-classifies each page still in the artifact, so the
/// raw event list repeats pages and would overstate the sample.
fn latest_per_scope(records: Vec<AuditRecord>) -> Vec<AuditRecord> {
    let mut latest: HashMap<String, AuditRecord> = HashMap::new();
    for record in records {
        match latest.get(&record.scope) {
            Some(existing) if existing.recorded_at > record.recorded_at => {}
            _ => {
                latest.insert(record.scope.clone(), record);
            }
        }
    }
    let mut records: Vec<AuditRecord> = latest.into_values().collect();
    records.sort_by(|a, b| {
        a.recorded_at
            .cmp(&b.recorded_at)
            .then_with(|| a.scope.cmp(&b.scope))
    });
    records
}

fn run_scope(now: DateTime<Utc>) -> String {
    format!("learner:{}", now.format("%Y-%m-%d"))
}

fn strip_markdown_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("markdown").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
