//! End-to-end batches on the tokio runtime with simulated workers.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{config, node, target};
use wave_batcher::builders::EngineBuilder;
use wave_batcher::config::SchedulerConfig;
use wave_batcher::core::{
    OperationDurations, SchedulerError, StageDispatcher, StageExecutor, StageKind, StageOrder,
    Target, TargetSource,
};
use wave_batcher::infra::{completion_channel, InMemoryInventory, InMemoryTargetSource};
use wave_batcher::runtime::{LocalWorkerRuntime, SimulatedStageExecutor, TokioSpawner};
use wave_batcher::util::clock::now_ms;

fn fast_config() -> SchedulerConfig {
    let mut cfg = config();
    cfg.timing.cycle_spacing_ms = 20;
    cfg.timing.queue_delay_ms = 10;
    cfg.timing.completion_deadline_buffer_ms = 500;
    cfg.timing.tick_interval_ms = 10;
    cfg.timing.error_backoff_ms = 20;
    cfg
}

fn fast_target(hostname: &str) -> Target {
    let mut t = target(hostname);
    t.durations = OperationDurations {
        hack_ms: 40,
        grow_ms: 80,
        weaken_ms: 100,
    };
    t
}

fn order(kind: StageKind, threads: u32) -> StageOrder {
    StageOrder {
        kind,
        target: "joesguns".into(),
        worker: "home".into(),
        dispatch_time_ms: now_ms(),
        start_delay_ms: 0,
        duration_ms: 1,
        threads,
        batch_id: "joesguns-1".into(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batches_complete_end_to_end() {
    wave_batcher::util::init_tracing();
    let cfg = fast_config();
    let inventory = Arc::new(InMemoryInventory::new([node("home", 1_000.0)]));
    let targets = Arc::new(InMemoryTargetSource::new(100, [fast_target("joesguns")]));
    let (signals, receiver) = completion_channel(None);
    let runtime = LocalWorkerRuntime::new(
        Arc::clone(&inventory),
        SimulatedStageExecutor::new(Arc::clone(&targets), cfg.threads.clone()),
        TokioSpawner::current(),
        signals,
        cfg.threads.stage_cost.clone(),
    );
    let (builder, audit) = EngineBuilder::new(cfg).with_audit_capacity(10_000);
    let mut engine = builder
        .build(Arc::clone(&inventory), Arc::clone(&targets), runtime, receiver)
        .unwrap();

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        flag.store(true, Ordering::Release);
    });
    engine.run(shutdown).await;

    let counters = engine.counters().clone();
    assert!(counters.dispatched >= 1);
    assert!(counters.completed >= 1, "{counters:?}");
    assert!(counters.resource_gained > 0.0);
    assert_eq!(engine.signal_stats().malformed, 0);
    assert_eq!(
        audit.lock().target_summary("joesguns").completed,
        counters.completed
    );

    // Stages still in flight release their capacity once they finish.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let home = inventory.node("home").unwrap();
    assert!(home.used_capacity.abs() < 1e-6, "{home:?}");
}

#[tokio::test]
async fn test_dispatch_without_capacity_is_rejected() {
    let cfg = fast_config();
    let inventory = Arc::new(InMemoryInventory::new([node("home", 10.0)]));
    let targets = Arc::new(InMemoryTargetSource::new(100, [fast_target("joesguns")]));
    let (signals, receiver) = completion_channel(None);
    let runtime = LocalWorkerRuntime::new(
        Arc::clone(&inventory),
        SimulatedStageExecutor::new(targets, cfg.threads.clone()),
        TokioSpawner::current(),
        signals,
        cfg.threads.stage_cost,
    );

    let result = runtime.dispatch(&order(StageKind::Hack, 33));
    assert!(matches!(
        result,
        Err(SchedulerError::Dispatch { stage: StageKind::Hack, .. })
    ));
    assert!(receiver.is_empty());
    assert!(inventory.node("home").unwrap().used_capacity.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_accepted_stage_reports_on_the_channel() {
    let cfg = fast_config();
    let inventory = Arc::new(InMemoryInventory::new([node("home", 100.0)]));
    let targets = Arc::new(InMemoryTargetSource::new(100, [fast_target("joesguns")]));
    let (signals, receiver) = completion_channel(None);
    let runtime = LocalWorkerRuntime::new(
        Arc::clone(&inventory),
        SimulatedStageExecutor::new(targets, cfg.threads.clone()),
        TokioSpawner::current(),
        signals,
        cfg.threads.stage_cost,
    );

    runtime.dispatch(&order(StageKind::WeakenHack, 2)).unwrap();
    assert!((inventory.node("home").unwrap().used_capacity - 3.5).abs() < 1e-9);

    let mut raw = None;
    for _ in 0..100 {
        if let Ok(line) = receiver.try_recv() {
            raw = Some(line);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // The fixture target sits at minimum security, so weaken has nothing to remove.
    assert_eq!(raw.as_deref(), Some("weaken1_done|joesguns-1|0|2"));
    assert!(inventory.node("home").unwrap().used_capacity.abs() < 1e-9);
}

#[tokio::test]
async fn test_simulated_stages_move_the_target() {
    let cfg = fast_config();
    let targets = Arc::new(InMemoryTargetSource::new(100, [fast_target("joesguns")]));
    let executor = SimulatedStageExecutor::new(Arc::clone(&targets), cfg.threads.clone());

    let hack = executor.execute(order(StageKind::Hack, 33)).await;
    assert!(hack.success);
    assert!((hack.value - 198_000.0).abs() < 1e-6);

    let weaken = executor.execute(order(StageKind::WeakenHack, 2)).await;
    assert!((weaken.value - 0.066).abs() < 1e-9);

    let grow = executor.execute(order(StageKind::Grow, 21)).await;
    assert!(grow.value > 1.0);

    let mut missing = order(StageKind::Hack, 1);
    missing.target = "nowhere".into();
    assert!(!executor.execute(missing).await.success);

    let t = targets.target("joesguns").unwrap().unwrap();
    assert!(t.current_resource > 1_802_000.0);
    assert!((t.security_current - (10.0 + 21.0 * 0.004)).abs() < 1e-9);
}
