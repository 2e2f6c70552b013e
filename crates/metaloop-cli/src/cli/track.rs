//! `metaloop track`: classify earlier output against fresh metrics.

use anyhow::Result;
use chrono::Utc;

use metaloop_infra::artifact::load_artifact;

use crate::cli::output::{self, OutputMode};
use crate::state::AppState;

pub async fn track(state: &AppState, mode: OutputMode) -> Result<()> {
    let site = state.site()?;
    let artifact = load_artifact(&state.output_path()).await?;
    let records = artifact.tracked_records(site);
    tracing::info!(records = records.len(), "tracking generated descriptions");

    let tracker = state.tracker(state.metrics().await?)?;
    let report = tracker.run(&records, Utc::now()).await?;

    mode.emit(
        || output::tracking_json(&report),
        || output::print_tracking(&report),
    )
}
