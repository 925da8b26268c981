//! Batch records and the registry of active batches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::error::SchedulerError;
use crate::core::model::{StageKind, StageThreads};

/// Lifecycle status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Dispatched, fewer than four completions seen.
    Active,
    /// All four completions seen.
    Completed,
    /// Deadline passed before all four completions.
    Failed,
}

/// One dispatched four-stage cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// `<target>-<dispatchTimestampMillis>`.
    pub id: String,
    /// Target host name.
    pub target: String,
    /// Worker all four stages were dispatched to.
    pub worker: String,
    /// Batch start time (ms since epoch).
    pub dispatch_time_ms: u64,
    /// Deadline after which an incomplete batch is evicted.
    pub expected_completion_ms: u64,
    /// Planned threads per stage.
    pub threads: StageThreads,
    completed: [bool; 4],
    /// Resource reported by successful hack stages.
    pub resource_gained: f64,
    /// Security reduction reported by successful weaken stages.
    pub security_reduced: f64,
    /// Stages that reported `failed`.
    pub failed_stages: u32,
    /// Lifecycle status.
    pub status: BatchStatus,
}

impl Batch {
    /// Create an active batch with no completions.
    #[must_use]
    pub fn new(
        id: String,
        target: String,
        worker: String,
        dispatch_time_ms: u64,
        expected_completion_ms: u64,
        threads: StageThreads,
    ) -> Self {
        Self {
            id,
            target,
            worker,
            dispatch_time_ms,
            expected_completion_ms,
            threads,
            completed: [false; 4],
            resource_gained: 0.0,
            security_reduced: 0.0,
            failed_stages: 0,
            status: BatchStatus::Active,
        }
    }

    /// Mark a stage complete. Returns `false` if it already was.
    ///
    /// Flags only ever move from `false` to `true`.
    pub fn mark_completed(&mut self, kind: StageKind) -> bool {
        let flag = &mut self.completed[kind.index()];
        let newly = !*flag;
        *flag = true;
        newly
    }

    /// Whether the stage has reported.
    #[must_use]
    pub const fn is_stage_completed(&self, kind: StageKind) -> bool {
        self.completed[kind.index()]
    }

    /// Completion flags in stage order.
    #[must_use]
    pub const fn completion_flags(&self) -> [bool; 4] {
        self.completed
    }

    /// Number of stages that have reported.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.iter().filter(|done| **done).count()
    }

    /// All four stages have reported.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed.iter().all(|done| *done)
    }
}

/// Aggregate batch counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchCounters {
    /// Batches registered after a full dispatch.
    pub dispatched: u64,
    /// Batches finalized with all four completions.
    pub completed: u64,
    /// Batches evicted at their deadline.
    pub failed: u64,
    /// Stages of completed batches that reported `failed`.
    pub failed_stages: u64,
    /// Resource gained by completed batches.
    pub resource_gained: f64,
    /// Security reduced by completed batches.
    pub security_reduced: f64,
}

/// Active batches keyed by id, plus aggregate counters.
///
/// Owned by the engine and lent to the scheduler and tracker by `&mut`.
#[derive(Debug, Default)]
pub struct BatchRegistry {
    active: HashMap<String, Batch>,
    counters: BatchCounters,
}

impl BatchRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly dispatched batch.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DuplicateBatch`] if the id is already active.
    pub fn register(&mut self, batch: Batch) -> Result<(), SchedulerError> {
        if self.active.contains_key(&batch.id) {
            return Err(SchedulerError::DuplicateBatch(batch.id));
        }
        self.counters.dispatched += 1;
        self.active.insert(batch.id.clone(), batch);
        Ok(())
    }

    /// Whether a batch id is active.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Look up an active batch.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Batch> {
        self.active.get(id)
    }

    /// Look up an active batch for mutation.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Batch> {
        self.active.get_mut(id)
    }

    /// Number of active batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// No active batches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active batches in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.active.values()
    }

    /// Active batches against one target.
    #[must_use]
    pub fn count_for_target(&self, target: &str) -> usize {
        self.active.values().filter(|b| b.target == target).count()
    }

    /// Aggregate counters.
    #[must_use]
    pub const fn counters(&self) -> &BatchCounters {
        &self.counters
    }

    /// Remove a batch as completed, folding its totals into the counters.
    pub(crate) fn finalize(&mut self, id: &str) -> Option<Batch> {
        let mut batch = self.active.remove(id)?;
        batch.status = BatchStatus::Completed;
        self.counters.completed += 1;
        self.counters.failed_stages += u64::from(batch.failed_stages);
        self.counters.resource_gained += batch.resource_gained;
        self.counters.security_reduced += batch.security_reduced;
        Some(batch)
    }

    /// Remove a batch as failed.
    pub(crate) fn evict_failed(&mut self, id: &str) -> Option<Batch> {
        let mut batch = self.active.remove(id)?;
        batch.status = BatchStatus::Failed;
        self.counters.failed += 1;
        Some(batch)
    }

    /// Ids of active batches, sorted for deterministic sweeps.
    pub(crate) fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}
