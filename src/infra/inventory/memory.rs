//! In-memory worker inventory.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::core::{SchedulerError, WorkerInventory, WorkerNode};

/// Worker inventory held in memory, shared between the engine and whatever commits
/// or releases capacity (e.g. [`crate::runtime::LocalWorkerRuntime`]).
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    nodes: RwLock<BTreeMap<String, WorkerNode>>,
}

impl InMemoryInventory {
    /// Create an inventory from a node list.
    #[must_use]
    pub fn new(nodes: impl IntoIterator<Item = WorkerNode>) -> Self {
        Self {
            nodes: RwLock::new(
                nodes
                    .into_iter()
                    .map(|n| (n.hostname.clone(), n))
                    .collect(),
            ),
        }
    }

    /// Insert or replace a node.
    pub fn upsert(&self, node: WorkerNode) {
        self.nodes.write().insert(node.hostname.clone(), node);
    }

    /// Remove a node.
    pub fn remove(&self, hostname: &str) -> Option<WorkerNode> {
        self.nodes.write().remove(hostname)
    }

    /// Current state of one node.
    #[must_use]
    pub fn node(&self, hostname: &str) -> Option<WorkerNode> {
        self.nodes.read().get(hostname).cloned()
    }

    /// Commit capacity on a node if it is privileged and has room.
    ///
    /// # Errors
    ///
    /// Fails when the node is unknown, unprivileged or lacks capacity.
    pub fn commit(&self, hostname: &str, units: f64) -> Result<(), SchedulerError> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(hostname)
            .ok_or_else(|| SchedulerError::Backend(format!("unknown worker {hostname}")))?;
        if !node.privileged {
            return Err(SchedulerError::Backend(format!("worker {hostname} is not privileged")));
        }
        if node.available() < units {
            return Err(SchedulerError::Backend(format!(
                "worker {hostname} has {:.2} units available, {units:.2} requested",
                node.available()
            )));
        }
        node.used_capacity += units;
        Ok(())
    }

    /// Return capacity to a node. Unknown nodes are ignored.
    pub fn release(&self, hostname: &str, units: f64) {
        if let Some(node) = self.nodes.write().get_mut(hostname) {
            node.used_capacity = (node.used_capacity - units).max(0.0);
        }
    }
}

impl WorkerInventory for InMemoryInventory {
    fn snapshot(&self) -> Result<Vec<WorkerNode>, SchedulerError> {
        Ok(self.nodes.read().values().cloned().collect())
    }
}
