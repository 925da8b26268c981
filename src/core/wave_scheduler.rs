//! Dispatch of bounded waves of overlapping batches.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{SchedulerConfig, ThreadConfig};
use crate::core::batch::{Batch, BatchRegistry};
use crate::core::error::SchedulerError;
use crate::core::executor::{StageDispatcher, StageOrder};
use crate::core::inventory::{CapacitySnapshot, WorkerInventory};
use crate::core::model::{StageKind, StageThreads, Target};
use crate::core::signal::batch_id;
use crate::core::timing::{BatchTiming, TimingPlanner};

/// Why a wave stopped adding batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveStop {
    /// The concurrency ceiling is reached.
    SlotsExhausted,
    /// The next batch would start after the first batch's extraction ended.
    TimingOverlap,
    /// Free capacity, or every privileged worker, is too small for the next batch.
    NoCapacity,
    /// A stage dispatch was rejected.
    DispatchFailed,
    /// The next batch id is already active.
    DuplicateBatchId,
    /// The target cannot be planned (no extraction or growth per thread).
    NoThreadPlan,
}

/// Result of one scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveOutcome {
    /// Batches registered in this pass.
    pub scheduled: usize,
    /// Concurrency ceiling for the pass, counting batches already active.
    pub ceiling: u32,
    /// New batches the pass was allowed to add: free concurrency slots capped by
    /// the batches that fit into free capacity.
    pub slots: u32,
    /// Why the pass stopped.
    pub stop: WaveStop,
    /// Ids of the registered batches.
    pub batch_ids: Vec<String>,
}

impl WaveOutcome {
    const fn stopped(stop: WaveStop, ceiling: u32, slots: u32) -> Self {
        Self {
            scheduled: 0,
            ceiling,
            slots,
            stop,
            batch_ids: Vec::new(),
        }
    }
}

/// Everything a scheduling pass reads or mutates besides the target.
pub struct WaveContext<'a, W: ?Sized, D: ?Sized> {
    /// Scheduling instant.
    pub now_ms: u64,
    /// Concurrency ceiling from the utilization controller.
    pub ceiling: u32,
    /// Padding multiplier applied to grow and weaken threads.
    pub padding: f64,
    /// Live worker capacity.
    pub inventory: &'a W,
    /// Stage dispatcher.
    pub dispatcher: &'a D,
    /// Active batches.
    pub registry: &'a mut BatchRegistry,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_threads(raw: f64) -> u32 {
    if raw.is_finite() && raw > 0.0 {
        raw.ceil().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// Schedules waves of batches against one target.
#[derive(Debug, Clone)]
pub struct WaveScheduler {
    planner: TimingPlanner,
    queue_delay_ms: u64,
    deadline_buffer_ms: u64,
    threads: ThreadConfig,
}

impl WaveScheduler {
    /// Create a scheduler from the relevant configuration sections.
    #[must_use]
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            planner: TimingPlanner::new(config.timing.cycle_spacing_ms),
            queue_delay_ms: config.timing.queue_delay_ms,
            deadline_buffer_ms: config.timing.completion_deadline_buffer_ms,
            threads: config.threads.clone(),
        }
    }

    /// Timing planner used for every batch.
    #[must_use]
    pub const fn planner(&self) -> &TimingPlanner {
        &self.planner
    }

    /// Thread counts for one batch against `target`.
    ///
    /// Hack threads take the configured extraction fraction; grow threads restore the
    /// extracted share times the growth buffer; each weaken stage offsets the security
    /// raised by the stage before it. Grow and weaken counts are scaled by `padding`.
    /// Every stage gets at least one thread. `None` if the target cannot be planned.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn plan_threads(&self, target: &Target, padding: f64) -> Option<StageThreads> {
        let cfg = &self.threads;
        let per_thread = target.extract_fraction_per_thread;
        if !(per_thread > 0.0) || !(target.growth_per_thread > 0.0) {
            return None;
        }

        let hack = (cfg.extraction_fraction / per_thread).floor().max(1.0);
        let extracted = hack * per_thread;
        if extracted >= 1.0 {
            return None;
        }
        let hack = whole_threads(hack);

        let multiplier = cfg.growth_buffer / (1.0 - extracted);
        let grow_raw = multiplier.ln() / target.growth_per_thread.ln_1p();
        let grow = whole_threads(grow_raw * padding).max(1);

        let weaken_hack = whole_threads(
            f64::from(hack) * cfg.hack_security_increase / cfg.weaken_security_decrease * padding,
        )
        .max(1);
        let weaken_grow = whole_threads(
            f64::from(grow) * cfg.grow_security_increase / cfg.weaken_security_decrease * padding,
        )
        .max(1);

        Some(StageThreads([hack, weaken_hack, grow, weaken_grow]))
    }

    /// Precise capacity a batch commits on its worker.
    #[must_use]
    pub fn batch_cost(&self, threads: &StageThreads) -> f64 {
        StageKind::ALL
            .into_iter()
            .map(|kind| {
                f64::from(threads.get(kind)) * self.threads.stage_cost.of(kind.operation())
            })
            .sum()
    }

    /// Concurrency ceiling for a wave: the controller ceiling, capped by the number of
    /// batches that fit into one cycle. Active batches count against it.
    #[must_use]
    pub fn wave_ceiling(&self, controller_ceiling: u32, timing: &BatchTiming) -> u32 {
        let per_cycle = timing
            .total_duration()
            .checked_div(self.planner.spacing())
            .map_or(u32::MAX, |n| u32::try_from(n).unwrap_or(u32::MAX));
        controller_ceiling.min(per_cycle)
    }

    /// Batches that fit into `available_capacity`, priced at the blanket per-thread
    /// estimate. Free capacity already excludes what active batches committed.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn capacity_slots(&self, threads: &StageThreads, available_capacity: f64) -> u32 {
        let per_batch = f64::from(threads.total()) * self.threads.thread_capacity_estimate;
        if per_batch > 0.0 {
            (available_capacity / per_batch)
                .floor()
                .clamp(0.0, f64::from(u32::MAX)) as u32
        } else {
            0
        }
    }

    /// Dispatch as many batches against `target` as the ceiling and timing allow.
    ///
    /// A batch is registered only after all four of its stages were accepted. The first
    /// rejected stage ends the pass; stages already accepted cannot be recalled and
    /// surface later as orphan signals.
    ///
    /// # Errors
    ///
    /// Only inventory failures propagate; every other stop is reported in the outcome.
    pub fn schedule_wave<W, D>(
        &self,
        target: &Target,
        ctx: WaveContext<'_, W, D>,
    ) -> Result<WaveOutcome, SchedulerError>
    where
        W: WorkerInventory + ?Sized,
        D: StageDispatcher + ?Sized,
    {
        let Some(threads) = self.plan_threads(target, ctx.padding) else {
            warn!(host = %target.hostname, "target cannot be planned; skipping wave");
            return Ok(WaveOutcome::stopped(WaveStop::NoThreadPlan, 0, 0));
        };
        if !target.is_optimal() {
            debug!(
                host = %target.hostname,
                security = target.security_current,
                security_min = target.security_min,
                resource_ratio = target.resource_ratio(),
                "scheduling against a target that is not at its optimum"
            );
        }

        let first_start = ctx.now_ms + self.queue_delay_ms;
        let first = self.planner.plan(&target.durations, first_start);
        let available = CapacitySnapshot::take(ctx.inventory)?.available_total();
        let ceiling = self.wave_ceiling(ctx.ceiling, &first);
        let active = u32::try_from(ctx.registry.len()).unwrap_or(u32::MAX);
        let free = ceiling.saturating_sub(active);
        let by_capacity = self.capacity_slots(&threads, available);
        let slots = free.min(by_capacity);

        let cost = self.batch_cost(&threads);
        let stop = if by_capacity < free {
            WaveStop::NoCapacity
        } else {
            WaveStop::SlotsExhausted
        };
        let mut outcome = WaveOutcome::stopped(stop, ceiling, slots);

        for index in 0..u64::from(slots) {
            let start = first_start + index * self.planner.spacing();
            let timing = self.planner.plan(&target.durations, start);
            if index > 0 && timing.last_start() >= first.end(StageKind::Hack) {
                outcome.stop = WaveStop::TimingOverlap;
                break;
            }

            let id = batch_id(&target.hostname, start);
            if ctx.registry.contains(&id) {
                outcome.stop = WaveStop::DuplicateBatchId;
                break;
            }

            let snapshot = CapacitySnapshot::take(ctx.inventory)?;
            let Some(worker) = snapshot.select_worker(cost) else {
                debug!(host = %target.hostname, cost, "no worker can host the next batch");
                outcome.stop = WaveStop::NoCapacity;
                break;
            };
            let worker = worker.hostname.clone();

            if let Err(e) =
                dispatch_stages(target, &worker, &id, &timing, &threads, ctx.dispatcher)
            {
                warn!(
                    batch = %id,
                    worker = %worker,
                    error = %e,
                    "batch dispatch failed; ending wave"
                );
                outcome.stop = WaveStop::DispatchFailed;
                break;
            }

            let batch = Batch::new(
                id.clone(),
                target.hostname.clone(),
                worker,
                start,
                start + timing.total_duration() + self.deadline_buffer_ms,
                threads,
            );
            if let Err(e) = ctx.registry.register(batch) {
                warn!(error = %e, "batch registration failed; ending wave");
                outcome.stop = WaveStop::DuplicateBatchId;
                break;
            }
            outcome.scheduled += 1;
            outcome.batch_ids.push(id);
        }

        if outcome.scheduled > 0 {
            info!(
                host = %target.hostname,
                scheduled = outcome.scheduled,
                ceiling,
                slots,
                active,
                stop = ?outcome.stop,
                hack = threads.get(StageKind::Hack),
                weaken_hack = threads.get(StageKind::WeakenHack),
                grow = threads.get(StageKind::Grow),
                weaken_grow = threads.get(StageKind::WeakenGrow),
                "wave dispatched"
            );
        }
        Ok(outcome)
    }
}

fn dispatch_stages<D: StageDispatcher + ?Sized>(
    target: &Target,
    worker: &str,
    id: &str,
    timing: &BatchTiming,
    threads: &StageThreads,
    dispatcher: &D,
) -> Result<(), SchedulerError> {
    for kind in StageKind::ALL {
        let order = StageOrder {
            kind,
            target: target.hostname.clone(),
            worker: worker.to_string(),
            dispatch_time_ms: timing.start_ms,
            start_delay_ms: timing.start_delay(kind),
            duration_ms: timing.duration(kind),
            threads: threads.get(kind),
            batch_id: id.to_string(),
        };
        dispatcher.dispatch(&order)?;
    }
    Ok(())
}
