//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::model::StageKind;

/// Errors produced by scheduler components.
///
/// Most variants are handled inside the tick that produced them and only show up
/// in logs and counters; `Backend` failures from collaborators propagate out of
/// [`crate::core::BatchEngine::tick`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A stage could not be started on a worker.
    #[error("dispatch of {stage} on {worker} failed: {reason}")]
    Dispatch {
        /// Stage that failed to start.
        stage: StageKind,
        /// Worker the stage was sent to.
        worker: String,
        /// Collaborator-supplied reason.
        reason: String,
    },
    /// A completion signal could not be parsed.
    #[error("malformed completion signal: {0}")]
    SignalParse(#[from] SignalParseError),
    /// A completion signal referenced a batch that is not active.
    #[error("orphan completion signal for batch {0}")]
    OrphanSignal(String),
    /// A batch passed its deadline without all four completions.
    #[error("batch {0} timed out")]
    BatchTimeout(String),
    /// No candidate target is viable.
    #[error("no viable target")]
    NoViableTarget,
    /// A batch with the same id is already active.
    #[error("duplicate batch id: {0}")]
    DuplicateBatch(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Collaborator-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Reasons a raw completion signal is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalParseError {
    /// The signal did not split into exactly four `|`-separated fields.
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),
    /// The stage kind prefix is not one of the four stages.
    #[error("unknown stage kind `{0}`")]
    UnknownKind(String),
    /// The outcome suffix is neither `done` nor `failed`.
    #[error("unknown outcome `{0}`")]
    UnknownOutcome(String),
    /// The batch id field is empty.
    #[error("empty batch id")]
    EmptyBatchId,
    /// A numeric field could not be parsed.
    #[error("invalid {field}: `{value}`")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Raw field text.
        value: String,
    },
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
