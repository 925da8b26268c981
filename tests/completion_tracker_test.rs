//! Signal reconciliation against the registry of active batches.

use wave_batcher::core::{
    Batch, BatchRegistry, BatchStatus, CompletionSignal, CompletionTracker, SignalDisposition,
    StageKind, StageThreads,
};
use wave_batcher::infra::completion_channel;

const T: u64 = 1_690_000_000_000;
const ID: &str = "foodnstuff-1690000000000";

fn registry_with(ids: &[&str]) -> BatchRegistry {
    let mut registry = BatchRegistry::new();
    for id in ids {
        registry
            .register(Batch::new(
                (*id).to_string(),
                "foodnstuff".into(),
                "home".into(),
                T,
                T + 10_000,
                StageThreads([20, 1, 6, 1]),
            ))
            .unwrap();
    }
    registry
}

fn tracker() -> CompletionTracker {
    let (_sender, rx) = completion_channel(None);
    CompletionTracker::new(rx, 100)
}

#[test]
fn test_reference_signal_parses() {
    let signal = CompletionSignal::parse("hack_done|foodnstuff-1690000000000|125000|20").unwrap();
    assert_eq!(signal.kind, StageKind::Hack);
    assert_eq!(signal.batch_id, ID);
    assert!(signal.success);
    assert!((signal.value - 125_000.0).abs() < f64::EPSILON);
    assert_eq!(signal.threads, 20);
}

#[test]
fn test_garbage_is_dropped_without_mutation() {
    let mut registry = registry_with(&[ID]);
    let mut tracker = tracker();

    assert_eq!(tracker.apply(&mut registry, "garbage"), SignalDisposition::Malformed);

    let batch = registry.get(ID).unwrap();
    assert_eq!(batch.completion_flags(), [false; 4]);
    assert_eq!(tracker.stats().malformed, 1);
    assert_eq!(tracker.stats().applied, 0);
}

#[test]
fn test_orphan_leaves_counters_alone() {
    let mut registry = registry_with(&[ID]);
    let mut tracker = tracker();
    let before = registry.counters().clone();

    let disposition = tracker.apply(&mut registry, "weaken2_done|sigma-cosmetics-1|0.2|3");

    assert_eq!(disposition, SignalDisposition::Orphaned);
    assert_eq!(registry.counters(), &before);
    assert_eq!(registry.get(ID).unwrap().completed_count(), 0);
    assert_eq!(tracker.stats().orphaned, 1);
}

#[test]
fn test_timeout_with_two_flags_fails_once() {
    let mut registry = registry_with(&[ID]);
    let mut tracker = tracker();
    tracker.apply(&mut registry, &format!("hack_done|{ID}|125000|20"));
    tracker.apply(&mut registry, &format!("weaken1_done|{ID}|0.05|1"));

    // At the deadline the batch is still active.
    assert!(tracker.sweep(&mut registry, T + 10_000).failed.is_empty());

    let report = tracker.sweep(&mut registry, T + 10_001);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].status, BatchStatus::Failed);
    assert_eq!(report.failed[0].completed_count(), 2);
    assert!(!registry.contains(ID));
    assert_eq!(registry.counters().failed, 1);

    let again = tracker.sweep(&mut registry, T + 20_000);
    assert!(again.failed.is_empty());
    assert_eq!(registry.counters().failed, 1);

    // Late signals for the evicted batch are orphans.
    assert_eq!(
        tracker.apply(&mut registry, &format!("grow_done|{ID}|1.1|6")),
        SignalDisposition::Orphaned
    );
}

#[test]
fn test_flags_never_revert() {
    let mut registry = registry_with(&[ID]);
    let mut tracker = tracker();

    tracker.apply(&mut registry, &format!("grow_done|{ID}|1.1|6"));
    assert_eq!(
        tracker.apply(&mut registry, &format!("grow_failed|{ID}|0|6")),
        SignalDisposition::Duplicate
    );

    let batch = registry.get(ID).unwrap();
    assert!(batch.is_stage_completed(StageKind::Grow));
    assert_eq!(batch.failed_stages, 0);
    assert_eq!(tracker.stats().duplicates, 1);
}

#[test]
fn test_full_batch_finalizes_with_totals() {
    let mut registry = registry_with(&[ID]);
    let (sender, rx) = completion_channel(None);
    let mut tracker = CompletionTracker::new(rx, 100);

    for raw in [
        format!("hack_done|{ID}|125000|20"),
        format!("weaken1_done|{ID}|0.05|1"),
        format!("grow_done|{ID}|1.12|6"),
        format!("weaken2_failed|{ID}|0|1"),
    ] {
        assert!(sender.send_raw(raw));
    }
    assert_eq!(tracker.pending(), 4);
    assert_eq!(tracker.drain(&mut registry), 4);

    let report = tracker.sweep(&mut registry, T);
    assert_eq!(report.completed.len(), 1);
    assert!(registry.is_empty());

    let counters = registry.counters();
    assert_eq!(counters.completed, 1);
    assert_eq!(counters.failed, 0);
    assert_eq!(counters.failed_stages, 1);
    assert!((counters.resource_gained - 125_000.0).abs() < 1e-6);
    assert!((counters.security_reduced - 0.05).abs() < 1e-9);
}

#[test]
fn test_drain_respects_per_tick_bound() {
    let mut registry = registry_with(&[ID]);
    let (sender, rx) = completion_channel(None);
    let mut tracker = CompletionTracker::new(rx, 2);

    for _ in 0..5 {
        sender.send_raw("garbage");
    }
    assert_eq!(tracker.drain(&mut registry), 2);
    assert_eq!(tracker.pending(), 3);
    assert_eq!(tracker.drain(&mut registry), 2);
    assert_eq!(tracker.drain(&mut registry), 1);
    assert_eq!(tracker.drain(&mut registry), 0);
    assert_eq!(tracker.stats().received, 5);
}
