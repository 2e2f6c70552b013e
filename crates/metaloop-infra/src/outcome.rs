//! Append-only JSON-lines outcome store.
//!
//! Each audit record is one line. Queries scan the file, so this adapter is
//! meant for a single site's history, not for a shared telemetry backend.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use metaloop_core::audit::OutcomeStore;
use metaloop_types::audit::{AuditCategory, AuditRecord, OutcomePage};
use metaloop_types::error::OutcomeStoreError;

pub struct JsonlOutcomeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlOutcomeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<AuditRecord>, OutcomeStoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(OutcomeStoreError::Storage(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<AuditRecord>(line).map_err(|e| {
                    OutcomeStoreError::Corrupt(format!("{} line {}: {e}", self.path.display(), i + 1))
                })
            })
            .collect()
    }
}

impl OutcomeStore for JsonlOutcomeStore {
    async fn record(&self, record: &AuditRecord) -> Result<(), OutcomeStoreError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| OutcomeStoreError::Storage(format!("serialize: {e}")))?;
        line.push('\n');

        let storage = |e: std::io::Error| OutcomeStoreError::Storage(format!("{}: {e}", self.path.display()));
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(storage)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(storage)?;
        file.write_all(line.as_bytes()).await.map_err(storage)?;
        file.flush().await.map_err(storage)?;
        Ok(())
    }

    async fn query_by_category(
        &self,
        category: AuditCategory,
        since: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<OutcomePage, OutcomeStoreError> {
        let matching: Vec<AuditRecord> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| r.event.category() == category && r.recorded_at >= since)
            .collect();
        let total = matching.len();
        let records: Vec<AuditRecord> = matching.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + records.len() < total;
        Ok(OutcomePage { records, has_more })
    }
}
