//! Worker capacity reporting.

use std::cmp::Ordering;

use crate::core::error::SchedulerError;
use crate::core::model::WorkerNode;

/// Source of live worker capacity.
///
/// Implementations return a fresh snapshot on every call; the scheduler never
/// reserves capacity between calls.
pub trait WorkerInventory {
    /// Snapshot of all known worker nodes.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Backend`] when the inventory cannot be read.
    fn snapshot(&self) -> Result<Vec<WorkerNode>, SchedulerError>;
}

impl<W: WorkerInventory + ?Sized> WorkerInventory for &W {
    fn snapshot(&self) -> Result<Vec<WorkerNode>, SchedulerError> {
        (**self).snapshot()
    }
}

impl<W: WorkerInventory + ?Sized> WorkerInventory for std::sync::Arc<W> {
    fn snapshot(&self) -> Result<Vec<WorkerNode>, SchedulerError> {
        (**self).snapshot()
    }
}

/// Aggregate view over one inventory snapshot.
#[derive(Debug, Clone)]
pub struct CapacitySnapshot {
    nodes: Vec<WorkerNode>,
}

impl CapacitySnapshot {
    /// Wrap a snapshot.
    #[must_use]
    pub const fn new(nodes: Vec<WorkerNode>) -> Self {
        Self { nodes }
    }

    /// Take a snapshot from an inventory.
    ///
    /// # Errors
    ///
    /// Propagates inventory failures.
    pub fn take<W: WorkerInventory + ?Sized>(inventory: &W) -> Result<Self, SchedulerError> {
        inventory.snapshot().map(Self::new)
    }

    /// Nodes in the snapshot.
    #[must_use]
    pub fn nodes(&self) -> &[WorkerNode] {
        &self.nodes
    }

    /// Capacity available for dispatch across privileged nodes.
    #[must_use]
    pub fn available_total(&self) -> f64 {
        self.nodes
            .iter()
            .filter(|n| n.privileged)
            .map(WorkerNode::available)
            .sum()
    }

    /// Used over total capacity across all nodes, `None` when no capacity exists.
    #[must_use]
    pub fn utilization(&self) -> Option<f64> {
        let total: f64 = self.nodes.iter().map(|n| n.total_capacity).sum();
        if total <= 0.0 {
            return None;
        }
        let used: f64 = self.nodes.iter().map(|n| n.used_capacity).sum();
        Some((used / total).clamp(0.0, 1.0))
    }

    /// Privileged node with at least `required` available capacity.
    ///
    /// Prefers the most available capacity, then more cores, then host name order.
    #[must_use]
    pub fn select_worker(&self, required: f64) -> Option<&WorkerNode> {
        self.nodes
            .iter()
            .filter(|n| n.privileged && n.available() >= required)
            .min_by(|a, b| {
                b.available()
                    .partial_cmp(&a.available())
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.core_count.cmp(&a.core_count))
                    .then_with(|| a.hostname.cmp(&b.hostname))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(hostname: &str, privileged: bool, total: f64, used: f64, cores: u32) -> WorkerNode {
        WorkerNode {
            hostname: hostname.into(),
            privileged,
            total_capacity: total,
            used_capacity: used,
            core_count: cores,
        }
    }

    #[test]
    fn test_available_ignores_unprivileged_nodes() {
        let snapshot = CapacitySnapshot::new(vec![
            node("home", true, 64.0, 16.0, 4),
            node("foodnstuff", false, 16.0, 0.0, 1),
            node("sigma", true, 32.0, 40.0, 1),
        ]);
        assert!((snapshot.available_total() - 48.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_utilization_spans_all_nodes() {
        let snapshot = CapacitySnapshot::new(vec![
            node("home", true, 60.0, 30.0, 4),
            node("foodnstuff", false, 40.0, 20.0, 1),
        ]);
        assert!((snapshot.utilization().unwrap() - 0.5).abs() < f64::EPSILON);
        assert!(CapacitySnapshot::new(Vec::new()).utilization().is_none());
    }

    #[test]
    fn test_select_worker_prefers_most_available() {
        let snapshot = CapacitySnapshot::new(vec![
            node("a", true, 32.0, 0.0, 1),
            node("b", true, 64.0, 0.0, 1),
            node("c", true, 64.0, 0.0, 8),
            node("d", false, 128.0, 0.0, 8),
        ]);
        assert_eq!(snapshot.select_worker(10.0).unwrap().hostname, "c");
        assert_eq!(snapshot.select_worker(64.0).unwrap().hostname, "c");
        assert!(snapshot.select_worker(65.0).is_none());
    }
}
