//! Incremental persistence of generator outcomes.
//!
//! The generator reports each terminal outcome through a synchronous
//! callback. The sink folds it into the in-memory artifact and hands a
//! snapshot to a writer task, so the file on disk never lags more than one
//! page behind the batch.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use metaloop_infra::artifact::save_artifact;
use metaloop_types::artifact::BatchArtifact;
use metaloop_types::candidate::Candidate;
use metaloop_types::generation::GenerationOutcome;

pub struct ArtifactSink {
    artifact: BatchArtifact,
    run_id: String,
    tx: mpsc::UnboundedSender<BatchArtifact>,
    writer: JoinHandle<usize>,
}

impl ArtifactSink {
    pub fn spawn(path: PathBuf, artifact: BatchArtifact, run_id: impl Into<String>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<BatchArtifact>();
        let writer = tokio::spawn(async move {
            let mut write_errors = 0;
            while let Some(snapshot) = rx.recv().await {
                if let Err(e) = save_artifact(&path, &snapshot).await {
                    write_errors += 1;
                    tracing::warn!(error = %e, "failed to persist batch artifact");
                }
            }
            write_errors
        });
        Self {
            artifact,
            run_id: run_id.into(),
            tx,
            writer,
        }
    }

    /// Record one terminal outcome and queue a write.
    pub fn record(&mut self, candidate: &Candidate, outcome: &GenerationOutcome) {
        self.artifact
            .record_outcome(&candidate.path, outcome, &self.run_id);
        if self.tx.send(self.artifact.clone()).is_err() {
            tracing::warn!(page = %candidate.path, "artifact writer stopped, outcome not persisted");
        }
    }

    /// Wait for queued writes to land. Returns the final artifact.
    pub async fn finish(self) -> anyhow::Result<BatchArtifact> {
        drop(self.tx);
        let write_errors = self.writer.await?;
        if write_errors > 0 {
            anyhow::bail!("{write_errors} artifact write(s) failed");
        }
        Ok(self.artifact)
    }
}
