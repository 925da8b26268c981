//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use wave_batcher::config::{
    SchedulerConfig, SelectionConfig, StageCostConfig, ThreadConfig, TimingConfig,
    UtilizationConfig,
};
use wave_batcher::core::{
    OperationDurations, SchedulerError, StageDispatcher, StageOrder, Target, WorkerInventory,
    WorkerNode,
};
use wave_batcher::infra::InMemoryInventory;

// ============================================================================
// CONFIGURATION
// ============================================================================

pub fn config() -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent_batches: 10,
        max_signals_per_tick: 100,
        timing: TimingConfig {
            cycle_spacing_ms: 250,
            queue_delay_ms: 100,
            completion_deadline_buffer_ms: 1_000,
            tick_interval_ms: 200,
            error_backoff_ms: 2_000,
        },
        threads: ThreadConfig {
            extraction_fraction: 0.1,
            growth_buffer: 1.1,
            hack_security_increase: 0.002,
            grow_security_increase: 0.004,
            weaken_security_decrease: 0.05,
            stage_cost: StageCostConfig {
                hack: 1.7,
                grow: 1.75,
                weaken: 1.75,
            },
            thread_capacity_estimate: 1.75,
        },
        selection: SelectionConfig {
            reevaluation_interval_ms: 10_000,
            improvement_threshold: 1.2,
            efficiency_drop_threshold: 0.5,
            depleted_ratio: 0.1,
        },
        utilization: UtilizationConfig {
            history_len: 20,
            high_water: 0.9,
            low_water: 0.5,
            high_samples: 6,
            low_samples: 3,
            base_padding: 1.0,
            padding_step: 0.1,
            max_padding: 1.5,
        },
    }
}

// ============================================================================
// DOMAIN FIXTURES
// ============================================================================

/// Plans to threads [33, 2, 21, 2]: 58 threads, 99.85 precise units, 101.5 estimated.
pub fn target(hostname: &str) -> Target {
    Target {
        hostname: hostname.into(),
        required_skill: 1,
        max_resource: 2_000_000.0,
        current_resource: 2_000_000.0,
        security_current: 10.0,
        security_min: 10.0,
        durations: OperationDurations {
            hack_ms: 1_000,
            grow_ms: 3_200,
            weaken_ms: 4_000,
        },
        success_chance: 1.0,
        has_access: true,
        extract_fraction_per_thread: 0.003,
        growth_per_thread: 0.01,
    }
}

pub const BATCH_COST: f64 = 99.85;

pub fn node(hostname: &str, total: f64) -> WorkerNode {
    WorkerNode {
        hostname: hostname.into(),
        privileged: true,
        total_capacity: total,
        used_capacity: 0.0,
        core_count: 1,
    }
}

// ============================================================================
// TEST COLLABORATORS
// ============================================================================

/// Records every order and accepts all of them.
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    pub orders: Arc<Mutex<Vec<StageOrder>>>,
}

impl RecordingDispatcher {
    pub fn orders(&self) -> Vec<StageOrder> {
        self.orders.lock().clone()
    }
}

impl StageDispatcher for RecordingDispatcher {
    fn dispatch(&self, order: &StageOrder) -> Result<(), SchedulerError> {
        self.orders.lock().push(order.clone());
        Ok(())
    }
}

/// Accepts the first `accept` orders, rejects everything after.
pub struct FailingDispatcher {
    pub accept: usize,
    pub calls: AtomicUsize,
}

impl FailingDispatcher {
    pub fn new(accept: usize) -> Self {
        Self {
            accept,
            calls: AtomicUsize::new(0),
        }
    }
}

impl StageDispatcher for FailingDispatcher {
    fn dispatch(&self, order: &StageOrder) -> Result<(), SchedulerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.accept {
            Ok(())
        } else {
            Err(SchedulerError::Dispatch {
                stage: order.kind,
                worker: order.worker.clone(),
                reason: "no free slot".into(),
            })
        }
    }
}

/// Commits stage capacity on a shared inventory, like a real worker would, and
/// records the capacity the worker had left just before each commit.
pub struct CommittingDispatcher {
    pub inventory: Arc<InMemoryInventory>,
    pub orders: Mutex<Vec<(StageOrder, f64)>>,
}

impl CommittingDispatcher {
    pub fn new(inventory: Arc<InMemoryInventory>) -> Self {
        Self {
            inventory,
            orders: Mutex::new(Vec::new()),
        }
    }
}

impl StageDispatcher for CommittingDispatcher {
    fn dispatch(&self, order: &StageOrder) -> Result<(), SchedulerError> {
        let cfg = config();
        let units = f64::from(order.threads) * cfg.threads.stage_cost.of(order.kind.operation());
        let before = self
            .inventory
            .node(&order.worker)
            .map_or(0.0, |n| n.available());
        self.inventory
            .commit(&order.worker, units)
            .map_err(|e| SchedulerError::Dispatch {
                stage: order.kind,
                worker: order.worker.clone(),
                reason: e.to_string(),
            })?;
        self.orders.lock().push((order.clone(), before));
        Ok(())
    }
}

/// Inventory whose backend is down.
pub struct BrokenInventory;

impl WorkerInventory for BrokenInventory {
    fn snapshot(&self) -> Result<Vec<WorkerNode>, SchedulerError> {
        Err(SchedulerError::Backend("inventory offline".into()))
    }
}
