//! Shared summary printers for phase results.

use console::style;
use serde_json::{Value, json};

use metaloop_core::cycle::PhaseResult;
use metaloop_core::tracker::TrackingReport;
use metaloop_types::generation::BatchResult;

/// How a phase command reports its summary on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Styled,
    Json,
    /// No summary at all; errors still surface through the exit status.
    Quiet,
}

impl OutputMode {
    pub fn emit(self, json: impl FnOnce() -> Value, styled: impl FnOnce()) -> anyhow::Result<()> {
        match self {
            OutputMode::Json => println!("{}", serde_json::to_string_pretty(&json())?),
            OutputMode::Styled => {
                println!();
                styled();
                println!();
            }
            OutputMode::Quiet => {}
        }
        Ok(())
    }
}

pub fn tracking_json(report: &TrackingReport) -> Value {
    json!({
        "tracked": report.summary.tracked,
        "high_performers": report.summary.high_performers,
        "insufficient_data": report.summary.insufficient_data,
        "too_recent": report.summary.too_recent,
        "outcomes": report.outcomes,
    })
}

pub fn print_tracking(report: &TrackingReport) {
    let summary = &report.summary;
    println!("  {}", style("── Tracking ──").dim());
    println!("  Tracked:           {}", style(summary.tracked).bold());
    println!("  High performers:   {}", style(summary.high_performers).green());
    println!("  Insufficient data: {}", style(summary.insufficient_data).yellow());
    println!("  Too recent:        {}", style(summary.too_recent).dim());
    for outcome in &report.outcomes {
        println!(
            "    {} {} ({})",
            style(outcome.category.as_str()).cyan(),
            outcome.path,
            outcome.improvement_pct()
        );
    }
}

pub fn learning_json(learned: Option<usize>) -> Value {
    match learned {
        Some(n) => json!({ "patterns_learned": n }),
        None => json!({ "patterns_learned": null, "skipped": "insufficient high performers" }),
    }
}

pub fn print_learning(learned: Option<usize>) {
    println!("  {}", style("── Learning ──").dim());
    match learned {
        Some(n) => println!(
            "  {} Learned {} pattern(s), quality guidance rewritten",
            style("✓").green(),
            style(n).bold()
        ),
        None => println!(
            "  {} Not enough high performers yet, prompt unchanged",
            style("·").dim()
        ),
    }
}

pub fn batch_json(batch: &BatchResult) -> Value {
    json!({
        "succeeded": batch.succeeded(),
        "failed": batch.failed(),
        "results": batch.results.iter().map(|r| json!({
            "path": r.path,
            "title": r.outcome.title,
            "description": r.outcome.description,
            "attempts": r.outcome.attempts,
        })).collect::<Vec<_>>(),
        "failures": batch.failures.iter().map(|f| json!({
            "path": f.path,
            "attempts": f.outcome.attempts,
            "last_reason": f.outcome.last_reason,
        })).collect::<Vec<_>>(),
    })
}

pub fn print_batch(batch: &BatchResult) {
    println!("  {}", style("── Generation ──").dim());
    println!("  Succeeded: {}", style(batch.succeeded()).green());
    if batch.failed() > 0 {
        println!("  Failed:    {}", style(batch.failed()).red());
        for failure in &batch.failures {
            println!(
                "    {} {} after {} attempt(s): {}",
                style("✗").red(),
                failure.path,
                failure.outcome.attempts,
                failure.outcome.last_reason
            );
        }
    } else {
        println!("  Failed:    {}", style(0).dim());
    }
}

/// A phase's JSON, or `{"error": ...}` when the phase failed.
pub fn phase_json<T>(result: &PhaseResult<T>, render: impl Fn(&T) -> Value) -> Value {
    match result {
        PhaseResult::Completed(value) => render(value),
        PhaseResult::Failed(error) => json!({ "error": error }),
    }
}

pub fn print_phase_failure(phase: &str, error: &str) {
    println!("  {}", style(format!("── {phase} ──")).dim());
    println!("  {} {}", style("✗ failed:").red().bold(), error);
}
