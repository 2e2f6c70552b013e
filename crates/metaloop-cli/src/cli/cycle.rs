//! `metaloop cycle`: track, learn, then generate.
//!
//! The metrics snapshot is loaded once. If it cannot be read, tracking is
//! reported as failed and generation runs against zero baselines.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use metaloop_core::cycle::{Flywheel, PhaseResult};
use metaloop_core::tracker::TrackingReport;
use metaloop_infra::artifact::load_artifact;
use metaloop_infra::metrics::SnapshotMetricsSource;
use metaloop_types::tracking::PageMetricsRow;

use crate::cli::generate::{baseline_rows, load_candidates, new_run_id};
use crate::cli::output::{self, OutputMode};
use crate::cli::sink::ArtifactSink;
use crate::state::AppState;

/// The snapshot plus baselines read from it; no baselines when it failed to load.
async fn cycle_metrics(state: &AppState) -> Result<(SnapshotMetricsSource, Vec<PageMetricsRow>)> {
    let metrics = state.metrics_or_unavailable().await;
    let rows = match metrics.load_error() {
        Some(_) => Vec::new(),
        None => baseline_rows(state, &metrics).await?,
    };
    Ok((metrics, rows))
}

/// A tracking run over an unloadable snapshot is a failure even when no
/// record was old enough to query.
fn tracking_outcome(
    tracking: PhaseResult<TrackingReport>,
    metrics: &SnapshotMetricsSource,
) -> PhaseResult<TrackingReport> {
    match metrics.load_error() {
        Some(reason) => PhaseResult::Failed(format!("metrics snapshot unavailable: {reason}")),
        None => tracking,
    }
}

pub async fn cycle(state: &AppState, limit: Option<usize>, mode: OutputMode) -> Result<()> {
    let site = state.site()?;
    let artifact = load_artifact(&state.output_path()).await?;
    let tracked = artifact.tracked_records(site);
    let (metrics, rows) = cycle_metrics(state).await?;
    let candidates = load_candidates(state, &artifact, limit, &rows).await?;

    let provider = state.provider()?;
    let flywheel = Flywheel::new(
        state.tracker(metrics.clone())?,
        state.learner(provider.clone()),
        state.generator(provider),
    );

    let run_id = new_run_id();
    tracing::info!(run_id = %run_id, tracked = tracked.len(), candidates = candidates.len(), "starting cycle");

    let mut sink = ArtifactSink::spawn(state.output_path(), artifact, run_id.clone());
    let mut report = flywheel
        .run_cycle(&tracked, &candidates, Utc::now(), |candidate, outcome| {
            sink.record(candidate, outcome)
        })
        .await;
    sink.finish().await?;
    report.tracking = tracking_outcome(report.tracking, &metrics);

    mode.emit(
        || {
            json!({
                "run_id": run_id,
                "tracking": output::phase_json(&report.tracking, output::tracking_json),
                "learning": output::phase_json(&report.learning, |l| output::learning_json(*l)),
                "generation": output::phase_json(&report.generation, output::batch_json),
            })
        },
        || {
            match &report.tracking {
                PhaseResult::Completed(r) => output::print_tracking(r),
                PhaseResult::Failed(e) => output::print_phase_failure("Tracking", e),
            }
            println!();
            match &report.learning {
                PhaseResult::Completed(l) => output::print_learning(*l),
                PhaseResult::Failed(e) => output::print_phase_failure("Learning", e),
            }
            println!();
            match &report.generation {
                PhaseResult::Completed(b) => output::print_batch(b),
                PhaseResult::Failed(e) => output::print_phase_failure("Generation", e),
            }
        },
    )
}
