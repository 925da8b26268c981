//! Stage dispatch and execution traits.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::SchedulerError;
use crate::core::model::StageKind;

/// One stage handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOrder {
    /// Stage to run.
    pub kind: StageKind,
    /// Target host name.
    pub target: String,
    /// Worker the stage runs on.
    pub worker: String,
    /// Batch start time (ms since epoch).
    pub dispatch_time_ms: u64,
    /// Delay after the batch start before the stage begins.
    pub start_delay_ms: u64,
    /// Planned run time of the stage.
    pub duration_ms: u64,
    /// Thread count.
    pub threads: u32,
    /// Owning batch.
    pub batch_id: String,
}

impl StageOrder {
    /// Absolute time the stage should begin.
    #[must_use]
    pub const fn start_at_ms(&self) -> u64 {
        self.dispatch_time_ms + self.start_delay_ms
    }
}

/// Fire-and-forget stage dispatch.
///
/// `Ok` only means the stage was accepted for asynchronous execution; its outcome
/// arrives later as a completion signal. Failures must be reported synchronously.
pub trait StageDispatcher {
    /// Start one stage.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Dispatch`] when no process could be started.
    fn dispatch(&self, order: &StageOrder) -> Result<(), SchedulerError>;
}

impl<D: StageDispatcher + ?Sized> StageDispatcher for std::sync::Arc<D> {
    fn dispatch(&self, order: &StageOrder) -> Result<(), SchedulerError> {
        (**self).dispatch(order)
    }
}

/// Result of running one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Whether the stage succeeded.
    pub success: bool,
    /// Stage-specific numeric result (amount, multiplier or security delta).
    pub value: f64,
}

/// Executes a stage on a worker and reports its outcome.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use wave_batcher::core::{StageExecutor, StageOrder, StageOutcome};
///
/// #[derive(Clone)]
/// struct SleepExecutor;
///
/// #[async_trait]
/// impl StageExecutor for SleepExecutor {
///     async fn execute(&self, order: StageOrder) -> StageOutcome {
///         tokio::time::sleep(std::time::Duration::from_millis(order.duration_ms)).await;
///         StageOutcome { success: true, value: 0.0 }
///     }
/// }
/// ```
#[async_trait]
pub trait StageExecutor: Send + Sync + Clone + 'static {
    /// Run the stage to completion. Called once its start delay has elapsed.
    async fn execute(&self, order: StageOrder) -> StageOutcome;
}

/// Abstraction for spawning stage execution on a runtime.
pub trait Spawn {
    /// Spawn a future to run in the background.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
