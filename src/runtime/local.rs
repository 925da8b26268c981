//! In-process worker runtime.
//!
//! Stands in for remote worker processes: every accepted stage commits its capacity
//! on the shared [`InMemoryInventory`], waits for its start delay, runs through a
//! [`StageExecutor`], releases the capacity and reports the outcome on the completion
//! channel in wire format. Nothing flows back into the scheduler except that signal.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::StageCostConfig;
use crate::core::{
    CompletionSignal, SchedulerError, Spawn, StageDispatcher, StageExecutor, StageOrder,
};
use crate::infra::{InMemoryInventory, SignalSender};
use crate::util::clock::now_ms;

/// [`StageDispatcher`] running stages on a local spawner.
pub struct LocalWorkerRuntime<X, S> {
    inventory: Arc<InMemoryInventory>,
    executor: X,
    spawner: S,
    signals: SignalSender,
    stage_cost: StageCostConfig,
}

impl<X, S> LocalWorkerRuntime<X, S>
where
    X: StageExecutor,
    S: Spawn,
{
    /// Create a runtime committing capacity on `inventory` at `stage_cost` per thread.
    #[must_use]
    pub const fn new(
        inventory: Arc<InMemoryInventory>,
        executor: X,
        spawner: S,
        signals: SignalSender,
        stage_cost: StageCostConfig,
    ) -> Self {
        Self {
            inventory,
            executor,
            spawner,
            signals,
            stage_cost,
        }
    }
}

impl<X, S> StageDispatcher for LocalWorkerRuntime<X, S>
where
    X: StageExecutor,
    S: Spawn,
{
    fn dispatch(&self, order: &StageOrder) -> Result<(), SchedulerError> {
        let units = f64::from(order.threads) * self.stage_cost.of(order.kind.operation());
        self.inventory
            .commit(&order.worker, units)
            .map_err(|e| SchedulerError::Dispatch {
                stage: order.kind,
                worker: order.worker.clone(),
                reason: e.to_string(),
            })?;

        let inventory = Arc::clone(&self.inventory);
        let executor = self.executor.clone();
        let signals = self.signals.clone();
        let order = order.clone();
        self.spawner.spawn(async move {
            let wait = order.start_at_ms().saturating_sub(now_ms());
            if wait > 0 {
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }

            let outcome = executor.execute(order.clone()).await;
            inventory.release(&order.worker, units);

            let signal = CompletionSignal {
                kind: order.kind,
                batch_id: order.batch_id,
                success: outcome.success,
                value: outcome.value,
                threads: order.threads,
            };
            if !signals.send(&signal) {
                debug!(
                    batch = %signal.batch_id,
                    stage = %signal.kind,
                    "completion signal not delivered"
                );
            }
        });
        Ok(())
    }
}
