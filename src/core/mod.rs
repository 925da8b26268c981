//! Core scheduling, timing, tracking and selection.

pub mod audit;
pub mod batch;
pub mod completion_tracker;
pub mod engine;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod model;
pub mod signal;
pub mod target_selector;
pub mod timing;
pub mod utilization;
pub mod wave_scheduler;

pub use audit::{
    batch_event, selection_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink,
    TargetSummary,
};
pub use batch::{Batch, BatchCounters, BatchRegistry, BatchStatus};
pub use completion_tracker::{CompletionTracker, SignalDisposition, SignalStats, SweepReport};
pub use engine::{BatchEngine, SharedAuditSink, TickReport};
pub use error::{AppResult, SchedulerError, SignalParseError};
pub use executor::{Spawn, StageDispatcher, StageExecutor, StageOrder, StageOutcome};
pub use inventory::{CapacitySnapshot, WorkerInventory};
pub use model::{
    Operation, OperationDurations, ScoredTarget, StageKind, StageThreads, Target, WorkerNode,
};
pub use signal::{batch_id, CompletionSignal};
pub use target_selector::{
    efficiency, fetch_candidates, score, Selection, SelectionOutcome, SwitchReason,
    TargetSelector, TargetSource,
};
pub use timing::{BatchTiming, TimingPlanner};
pub use utilization::{ControllerAction, UtilizationController};
pub use wave_scheduler::{WaveContext, WaveOutcome, WaveScheduler, WaveStop};
