//! The control loop tying all components together.
//!
//! One tick runs, strictly in sequence:
//!
//! 1. drain pending completion signals,
//! 2. sweep active batches (finalize or evict),
//! 3. re-evaluate the target (rate limited),
//! 4. schedule a wave against the selected target,
//! 5. feed current utilization to the controller.
//!
//! No component owns a thread; the only suspension point is the sleep between ticks.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::warn;

use crate::config::SchedulerConfig;
use crate::core::audit::{batch_event, selection_event, AuditAction, AuditSink};
use crate::core::batch::{BatchCounters, BatchRegistry};
use crate::core::completion_tracker::{CompletionTracker, SignalStats, SweepReport};
use crate::core::error::SchedulerError;
use crate::core::executor::StageDispatcher;
use crate::core::inventory::{CapacitySnapshot, WorkerInventory};
use crate::core::target_selector::{
    fetch_candidates, Selection, SelectionOutcome, TargetSelector, TargetSource,
};
use crate::core::utilization::{ControllerAction, UtilizationController};
use crate::core::wave_scheduler::{WaveContext, WaveOutcome, WaveScheduler};

/// Audit sink shared between the engine and whoever reads the trail.
pub type SharedAuditSink = Arc<Mutex<dyn AuditSink>>;

/// Summary of one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Signals taken off the channel.
    pub drained: usize,
    /// Batches finalized this tick.
    pub completed: usize,
    /// Batches evicted this tick.
    pub failed: usize,
    /// Selection outcome, `None` when re-evaluation was not due.
    pub selection: Option<SelectionOutcome>,
    /// Wave outcome, `None` without a selected target.
    pub wave: Option<WaveOutcome>,
    /// Utilization sampled at the end of the tick.
    pub utilization: Option<f64>,
    /// Controller reaction to the sample.
    pub controller: ControllerAction,
}

/// Wave batch engine over the three external collaborators.
pub struct BatchEngine<W, S, D> {
    config: SchedulerConfig,
    inventory: W,
    targets: S,
    dispatcher: D,
    registry: BatchRegistry,
    tracker: CompletionTracker,
    selector: TargetSelector,
    scheduler: WaveScheduler,
    controller: UtilizationController,
    audit: Option<SharedAuditSink>,
}

impl<W, S, D> BatchEngine<W, S, D>
where
    W: WorkerInventory,
    S: TargetSource,
    D: StageDispatcher,
{
    /// Assemble an engine from a configuration that already passed validation; see
    /// [`crate::builders::EngineBuilder`].
    #[must_use]
    pub(crate) fn new(
        config: SchedulerConfig,
        inventory: W,
        targets: S,
        dispatcher: D,
        signals: Receiver<String>,
        audit: Option<SharedAuditSink>,
    ) -> Self {
        Self {
            tracker: CompletionTracker::new(signals, config.max_signals_per_tick),
            selector: TargetSelector::new(config.selection.clone()),
            scheduler: WaveScheduler::new(&config),
            controller: UtilizationController::new(
                config.utilization.clone(),
                config.max_concurrent_batches,
            ),
            registry: BatchRegistry::new(),
            config,
            inventory,
            targets,
            dispatcher,
            audit,
        }
    }

    /// Run one tick at `now_ms`.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures. Dropped signals, failed dispatches, timeouts
    /// and the lack of a viable target are handled inside the tick.
    pub fn tick(&mut self, now_ms: u64) -> Result<TickReport, SchedulerError> {
        let drained = self.tracker.drain(&mut self.registry);
        let sweep = self.tracker.sweep(&mut self.registry, now_ms);
        self.audit_sweep(&sweep);

        let selection = if self.selector.is_due(now_ms) {
            let skill = self.targets.skill_level()?;
            let candidates = fetch_candidates(&self.targets)?;
            let outcome = self.selector.evaluate(&candidates, skill, now_ms);
            self.audit_selection(&outcome);
            Some(outcome)
        } else {
            None
        };

        let wave = self.schedule(now_ms)?;

        let utilization = CapacitySnapshot::take(&self.inventory)?.utilization();
        let controller = utilization.map_or(ControllerAction::Hold, |u| self.controller.record(u));

        Ok(TickReport {
            drained,
            completed: sweep.completed.len(),
            failed: sweep.failed.len(),
            selection,
            wave,
            utilization,
            controller,
        })
    }

    fn schedule(&mut self, now_ms: u64) -> Result<Option<WaveOutcome>, SchedulerError> {
        let Some(host) = self.selector.current().map(|s| s.hostname.clone()) else {
            return Ok(None);
        };
        let Some(target) = self.targets.target(&host)? else {
            warn!(host = %host, "selected target vanished from the target source");
            return Ok(None);
        };

        let outcome = self.scheduler.schedule_wave(
            &target,
            WaveContext {
                now_ms,
                ceiling: self.controller.ceiling(),
                padding: self.controller.padding(),
                inventory: &self.inventory,
                dispatcher: &self.dispatcher,
                registry: &mut self.registry,
            },
        )?;

        if let Some(audit) = &self.audit {
            let mut sink = audit.lock();
            for id in &outcome.batch_ids {
                if let Some(batch) = self.registry.get(id) {
                    sink.record(batch_event(batch, AuditAction::Dispatched, None));
                }
            }
        }
        Ok(Some(outcome))
    }

    fn audit_sweep(&self, sweep: &SweepReport) {
        let Some(audit) = &self.audit else {
            return;
        };
        let mut sink = audit.lock();
        for batch in &sweep.completed {
            sink.record(batch_event(batch, AuditAction::Completed, None));
        }
        for batch in &sweep.failed {
            let detail = format!("{}/4 stages reported", batch.completed_count());
            sink.record(batch_event(batch, AuditAction::Failed, Some(detail)));
        }
    }

    fn audit_selection(&self, outcome: &SelectionOutcome) {
        let (Some(audit), Some(current)) = (&self.audit, self.selector.current()) else {
            return;
        };
        let detail = match outcome {
            SelectionOutcome::Initial => "initial".to_string(),
            SelectionOutcome::Switched { from, reason } => format!("from {from}: {reason:?}"),
            _ => return,
        };
        audit
            .lock()
            .record(selection_event(current.hostname.clone(), Some(detail)));
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Active batches.
    #[must_use]
    pub const fn registry(&self) -> &BatchRegistry {
        &self.registry
    }

    /// Aggregate batch counters.
    #[must_use]
    pub const fn counters(&self) -> &BatchCounters {
        self.registry.counters()
    }

    /// Completion signal counters.
    #[must_use]
    pub const fn signal_stats(&self) -> SignalStats {
        self.tracker.stats()
    }

    /// Current target selection.
    #[must_use]
    pub const fn selection(&self) -> Option<&Selection> {
        self.selector.current()
    }

    /// Utilization controller state.
    #[must_use]
    pub const fn controller(&self) -> &UtilizationController {
        &self.controller
    }

    /// Wave scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &WaveScheduler {
        &self.scheduler
    }
}

#[cfg(feature = "tokio-runtime")]
mod run_loop {
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tracing::{debug, error, info};

    use super::BatchEngine;
    use crate::core::executor::StageDispatcher;
    use crate::core::inventory::WorkerInventory;
    use crate::core::target_selector::TargetSource;
    use crate::util::clock::now_ms;

    fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
        payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload")
    }

    impl<W, S, D> BatchEngine<W, S, D>
    where
        W: WorkerInventory,
        S: TargetSource,
        D: StageDispatcher,
    {
        /// Tick until `shutdown` is raised.
        ///
        /// Each tick is wrapped in a catch-all: an error or panic is logged and the loop
        /// sleeps for the configured backoff instead of the tick interval. The loop
        /// itself never fails.
        pub async fn run(&mut self, shutdown: Arc<AtomicBool>) {
            let interval = Duration::from_millis(self.config.timing.tick_interval_ms);
            let backoff = Duration::from_millis(self.config.timing.error_backoff_ms);
            info!(
                tick_interval_ms = self.config.timing.tick_interval_ms,
                max_concurrent_batches = self.config.max_concurrent_batches,
                "batch engine started"
            );

            while !shutdown.load(Ordering::Acquire) {
                let now = now_ms();
                let pause = match std::panic::catch_unwind(AssertUnwindSafe(|| self.tick(now))) {
                    Ok(Ok(report)) => {
                        debug!(
                            drained = report.drained,
                            completed = report.completed,
                            failed = report.failed,
                            scheduled = report.wave.as_ref().map_or(0, |w| w.scheduled),
                            active = self.registry.len(),
                            ceiling = self.controller.ceiling(),
                            "tick finished"
                        );
                        interval
                    }
                    Ok(Err(e)) => {
                        error!(
                            error = %e,
                            backoff_ms = self.config.timing.error_backoff_ms,
                            "tick failed"
                        );
                        backoff
                    }
                    Err(payload) => {
                        error!(
                            panic = panic_message(payload.as_ref()),
                            backoff_ms = self.config.timing.error_backoff_ms,
                            "tick panicked"
                        );
                        backoff
                    }
                };
                tokio::time::sleep(pause).await;
            }

            let counters = self.registry.counters();
            info!(
                dispatched = counters.dispatched,
                completed = counters.completed,
                failed = counters.failed,
                "batch engine stopped"
            );
        }
    }
}
