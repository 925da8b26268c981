//! Reconciliation of asynchronous completion signals with active batches.
//!
//! Producers are untrusted: signals may be malformed, late, duplicated or refer to
//! batches that were never registered. None of that is an error for the control loop;
//! such signals are counted, logged and dropped.

use crossbeam_channel::{Receiver, TryRecvError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::batch::{Batch, BatchRegistry};
use crate::core::error::SchedulerError;
use crate::core::model::Operation;
use crate::core::signal::CompletionSignal;

/// Counters for signals seen by the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalStats {
    /// Signals taken off the channel.
    pub received: u64,
    /// Signals applied to an active batch.
    pub applied: u64,
    /// Signals repeating a stage that had already reported.
    pub duplicates: u64,
    /// Signals that failed to parse.
    pub malformed: u64,
    /// Well-formed signals with no active batch.
    pub orphaned: u64,
}

/// What happened to one raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDisposition {
    /// Set a completion flag on an active batch.
    Applied,
    /// Matched a batch whose stage had already reported; nothing changed.
    Duplicate,
    /// Could not be parsed.
    Malformed,
    /// No active batch has this id.
    Orphaned,
}

/// Batches removed by one sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Batches finalized with all four completions.
    pub completed: Vec<Batch>,
    /// Batches evicted at their deadline.
    pub failed: Vec<Batch>,
}

/// Consumes completion signals and retires batches.
pub struct CompletionTracker {
    receiver: Receiver<String>,
    max_signals_per_tick: usize,
    stats: SignalStats,
}

impl CompletionTracker {
    /// Create a tracker consuming from `receiver`.
    #[must_use]
    pub const fn new(receiver: Receiver<String>, max_signals_per_tick: usize) -> Self {
        Self {
            receiver,
            max_signals_per_tick,
            stats: SignalStats {
                received: 0,
                applied: 0,
                duplicates: 0,
                malformed: 0,
                orphaned: 0,
            },
        }
    }

    /// Signal counters.
    #[must_use]
    pub const fn stats(&self) -> SignalStats {
        self.stats
    }

    /// Signals waiting on the channel.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Apply up to `max_signals_per_tick` pending signals. Returns how many were taken.
    pub fn drain(&mut self, registry: &mut BatchRegistry) -> usize {
        let mut taken = 0;
        while taken < self.max_signals_per_tick {
            match self.receiver.try_recv() {
                Ok(raw) => {
                    taken += 1;
                    self.apply(registry, &raw);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("completion channel has no producers left");
                    break;
                }
            }
        }
        taken
    }

    /// Apply one raw signal.
    pub fn apply(&mut self, registry: &mut BatchRegistry, raw: &str) -> SignalDisposition {
        self.stats.received += 1;

        let signal = match CompletionSignal::parse(raw) {
            Ok(signal) => signal,
            Err(e) => {
                self.stats.malformed += 1;
                let error = SchedulerError::from(e);
                warn!(signal = raw, %error, "dropping malformed completion signal");
                return SignalDisposition::Malformed;
            }
        };

        let Some(batch) = registry.get_mut(&signal.batch_id) else {
            self.stats.orphaned += 1;
            let error = SchedulerError::OrphanSignal(signal.batch_id);
            warn!(stage = %signal.kind, %error, "dropping completion signal");
            return SignalDisposition::Orphaned;
        };

        if !batch.mark_completed(signal.kind) {
            self.stats.duplicates += 1;
            debug!(batch = %batch.id, stage = %signal.kind, "duplicate completion signal");
            return SignalDisposition::Duplicate;
        }
        self.stats.applied += 1;

        if signal.threads != batch.threads.get(signal.kind) {
            debug!(
                batch = %batch.id,
                stage = %signal.kind,
                planned = batch.threads.get(signal.kind),
                reported = signal.threads,
                "stage ran with a different thread count"
            );
        }

        if signal.success {
            match signal.kind.operation() {
                Operation::Hack => batch.resource_gained += signal.value,
                Operation::Weaken => batch.security_reduced += signal.value,
                Operation::Grow => {
                    debug!(batch = %batch.id, multiplier = signal.value, "grow completed");
                }
            }
        } else {
            batch.failed_stages += 1;
            debug!(batch = %batch.id, stage = %signal.kind, "stage reported failure");
        }
        SignalDisposition::Applied
    }

    /// Finalize complete batches and evict those past their deadline.
    ///
    /// A batch is removed at most once per sweep: completion is checked first, and
    /// only incomplete batches are tested against the deadline.
    pub fn sweep(&self, registry: &mut BatchRegistry, now_ms: u64) -> SweepReport {
        let mut report = SweepReport::default();
        for id in registry.ids() {
            let Some(batch) = registry.get(&id) else {
                continue;
            };
            if batch.is_complete() {
                if let Some(done) = registry.finalize(&id) {
                    debug!(
                        batch = %done.id,
                        resource = done.resource_gained,
                        security = done.security_reduced,
                        "batch completed"
                    );
                    report.completed.push(done);
                }
            } else if now_ms > batch.expected_completion_ms {
                if let Some(failed) = registry.evict_failed(&id) {
                    warn!(
                        error = %SchedulerError::BatchTimeout(failed.id.clone()),
                        completed_stages = failed.completed_count(),
                        deadline = failed.expected_completion_ms,
                        "batch timed out"
                    );
                    report.failed.push(failed);
                }
            }
        }
        if !report.completed.is_empty() || !report.failed.is_empty() {
            info!(
                completed = report.completed.len(),
                failed = report.failed.len(),
                active = registry.len(),
                "batches retired"
            );
        }
        report
    }
}
