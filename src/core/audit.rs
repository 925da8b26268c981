//! Audit trail of batch lifecycle and selection events.
//!
//! The bounded in-memory sink doubles as the per-target performance history:
//! [`InMemoryAuditSink::target_summary`] folds recent events for one target.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::batch::Batch;
use crate::util::clock::now_ms;

/// Kind of recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// All four stages of a batch were accepted.
    Dispatched,
    /// A batch finalized with all completions.
    Completed,
    /// A batch was evicted at its deadline.
    Failed,
    /// The selected target changed.
    SelectionChanged,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::SelectionChanged => "selection_changed",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related batch identifier, empty for selection events.
    pub batch_id: String,
    /// Target host name.
    pub target: String,
    /// Worker host name, empty when not applicable.
    pub worker: String,
    /// Action taken.
    pub action: AuditAction,
    /// Resource gained (completed batches only).
    pub resource_gained: f64,
    /// Timestamp milliseconds.
    pub created_at_ms: u64,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// Folded history of one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    /// Batches dispatched.
    pub dispatched: u64,
    /// Batches completed.
    pub completed: u64,
    /// Batches failed.
    pub failed: u64,
    /// Resource gained by completed batches.
    pub resource_gained: f64,
}

/// In-memory audit sink with a bounded buffer.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }

    /// Fold retained events for one target.
    #[must_use]
    pub fn target_summary(&self, target: &str) -> TargetSummary {
        self.events
            .iter()
            .filter(|e| e.target == target)
            .fold(TargetSummary::default(), |mut acc, e| {
                match e.action {
                    AuditAction::Dispatched => acc.dispatched += 1,
                    AuditAction::Completed => {
                        acc.completed += 1;
                        acc.resource_gained += e.resource_gained;
                    }
                    AuditAction::Failed => acc.failed += 1,
                    AuditAction::SelectionChanged => {}
                }
                acc
            })
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Helper to build an audit event for a batch.
#[must_use]
pub fn batch_event(batch: &Batch, action: AuditAction, detail: Option<String>) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        batch_id: batch.id.clone(),
        target: batch.target.clone(),
        worker: batch.worker.clone(),
        action,
        resource_gained: batch.resource_gained,
        created_at_ms: now_ms(),
        detail,
    }
}

/// Helper to build a selection change event.
#[must_use]
pub fn selection_event(target: impl Into<String>, detail: Option<String>) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        batch_id: String::new(),
        target: target.into(),
        worker: String::new(),
        action: AuditAction::SelectionChanged,
        resource_gained: 0.0,
        created_at_ms: now_ms(),
        detail,
    }
}
