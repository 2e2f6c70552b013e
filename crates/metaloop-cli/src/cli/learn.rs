//! `metaloop learn`: mine outcomes for patterns and rewrite guidance.

use anyhow::Result;
use chrono::Utc;

use crate::cli::output::{self, OutputMode};
use crate::state::AppState;

pub async fn learn(state: &AppState, mode: OutputMode) -> Result<()> {
    let learner = state.learner(state.provider()?);
    let learned = learner.learn(Utc::now()).await?;

    mode.emit(
        || output::learning_json(learned),
        || output::print_learning(learned),
    )
}
