//! `metaloop generate`: produce descriptions for the candidates file.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use uuid::Uuid;

use metaloop_core::metrics::MetricsSource;
use metaloop_infra::artifact::{build_candidates, load_artifact, load_candidate_seeds};
use metaloop_types::artifact::BatchArtifact;
use metaloop_types::candidate::Candidate;
use metaloop_types::tracking::PageMetricsRow;

use crate::cli::output::{self, OutputMode};
use crate::cli::sink::ArtifactSink;
use crate::state::AppState;

/// New run identifier; v7 so ids sort by start time.
pub fn new_run_id() -> String {
    Uuid::now_v7().to_string()
}

/// Per-page baselines over the tracker window.
pub async fn baseline_rows(
    state: &AppState,
    metrics: &impl MetricsSource,
) -> Result<Vec<PageMetricsRow>> {
    let now = Utc::now();
    let start = (now - Duration::days(state.config.tracker.window_days)).date_naive();
    Ok(metrics
        .query_all(state.site()?, start, now.date_naive())
        .await?)
}

/// Candidates joined with `rows` and any earlier failure history from the
/// artifact. Pages missing from `rows` get a zero baseline.
pub async fn load_candidates(
    state: &AppState,
    artifact: &BatchArtifact,
    limit: Option<usize>,
    rows: &[PageMetricsRow],
) -> Result<Vec<Candidate>> {
    let site = state.site()?;
    let path = state.candidates_path();
    let mut seeds = load_candidate_seeds(&path)
        .await
        .with_context(|| format!("loading candidates {}", path.display()))?;
    if let Some(limit) = limit {
        seeds.truncate(limit);
    }
    Ok(build_candidates(site, seeds, rows, artifact))
}

pub async fn generate(state: &AppState, limit: Option<usize>, mode: OutputMode) -> Result<()> {
    let artifact = load_artifact(&state.output_path()).await?;
    let rows = baseline_rows(state, &state.metrics().await?).await?;
    let candidates = load_candidates(state, &artifact, limit, &rows).await?;
    let provider = state.provider()?;
    let prompt = state.prompt_store().load().await?;
    let generator = state.generator(provider);

    let run_id = new_run_id();
    tracing::info!(run_id = %run_id, candidates = candidates.len(), "starting generation batch");

    let mut sink = ArtifactSink::spawn(state.output_path(), artifact, run_id);
    let batch = generator
        .run_batch(&candidates, &prompt, |candidate, outcome| {
            sink.record(candidate, outcome)
        })
        .await;
    sink.finish().await?;

    mode.emit(|| output::batch_json(&batch), || output::print_batch(&batch))
}
