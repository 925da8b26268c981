//! Builder assembling a [`BatchEngine`] from configuration and collaborators.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::config::SchedulerConfig;
use crate::core::{
    BatchEngine, InMemoryAuditSink, SchedulerError, SharedAuditSink, StageDispatcher,
    TargetSource, WorkerInventory,
};

/// Builder for [`BatchEngine`].
pub struct EngineBuilder {
    config: SchedulerConfig,
    audit: Option<SharedAuditSink>,
}

impl EngineBuilder {
    /// Start from a configuration.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            audit: None,
        }
    }

    /// Configuration being built.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Record lifecycle events into `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: SharedAuditSink) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Record lifecycle events into a new bounded in-memory sink, returned alongside
    /// the builder so the caller can read it.
    #[must_use]
    pub fn with_audit_capacity(self, max_events: usize) -> (Self, Arc<Mutex<InMemoryAuditSink>>) {
        let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(max_events)));
        let shared: SharedAuditSink = sink.clone();
        (self.with_audit(shared), sink)
    }

    /// Validate the configuration and assemble the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] when validation fails.
    pub fn build<W, S, D>(
        self,
        inventory: W,
        targets: S,
        dispatcher: D,
        signals: Receiver<String>,
    ) -> Result<BatchEngine<W, S, D>, SchedulerError>
    where
        W: WorkerInventory,
        S: TargetSource,
        D: StageDispatcher,
    {
        self.config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(BatchEngine::new(
            self.config,
            inventory,
            targets,
            dispatcher,
            signals,
            self.audit,
        ))
    }
}
