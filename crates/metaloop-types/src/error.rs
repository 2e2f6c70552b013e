use thiserror::Error;

use crate::llm::LlmError;

/// Errors from the metrics-query capability.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics source unavailable: {0}")]
    Unavailable(String),

    #[error("invalid metrics data: {0}")]
    InvalidData(String),
}

/// Errors from the outcome store (audit sink).
#[derive(Debug, Error)]
pub enum OutcomeStoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt outcome record: {0}")]
    Corrupt(String),
}

/// Errors from prompt state persistence.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("filesystem error: {0}")]
    FileSystem(String),

    #[error("invalid pattern file: {0}")]
    InvalidPatterns(String),
}

/// Errors reading or writing local data files (artifact, candidates).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },
}

/// A tracker run aborted. The caller decides whether to continue the cycle.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("metrics fetch failed for {page}: {source}")]
    Metrics {
        page: String,
        #[source]
        source: MetricsError,
    },
}

/// A learner run aborted before or while mutating prompt state.
#[derive(Debug, Error)]
pub enum LearnerError {
    #[error("outcome query failed: {0}")]
    Outcomes(#[from] OutcomeStoreError),

    #[error("llm call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("prompt update failed: {0}")]
    Prompt(#[from] PromptError),
}
