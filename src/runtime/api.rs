//! Status snapshot exposed to operators.

use serde::{Deserialize, Serialize};

use crate::core::{
    Batch, BatchCounters, BatchEngine, Selection, SignalStats, StageDispatcher, TargetSource,
    WorkerInventory,
};

/// Point-in-time engine status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Aggregate batch counters.
    pub counters: BatchCounters,
    /// Completion signal counters.
    pub signals: SignalStats,
    /// Active batches sorted by dispatch time.
    pub active: Vec<Batch>,
    /// Current target selection.
    pub selection: Option<Selection>,
    /// Current concurrency ceiling.
    pub ceiling: u32,
    /// Current padding multiplier.
    pub padding: f64,
    /// Mean of recent utilization samples.
    pub average_utilization: Option<f64>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Build a status snapshot.
#[must_use]
pub fn status<W, S, D>(engine: &BatchEngine<W, S, D>) -> EngineStatus
where
    W: WorkerInventory,
    S: TargetSource,
    D: StageDispatcher,
{
    let mut active: Vec<Batch> = engine.registry().iter().cloned().collect();
    active.sort_by(|a, b| {
        a.dispatch_time_ms
            .cmp(&b.dispatch_time_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
    EngineStatus {
        counters: engine.counters().clone(),
        signals: engine.signal_stats(),
        active,
        selection: engine.selection().cloned(),
        ceiling: engine.controller().ceiling(),
        padding: engine.controller().padding(),
        average_utilization: engine.controller().average(),
    }
}

/// Return a health payload.
#[must_use]
pub const fn health() -> Health {
    Health { ok: true }
}
