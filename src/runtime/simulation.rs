//! Stage executor simulating its effect on in-memory targets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ThreadConfig;
use crate::core::{Operation, StageExecutor, StageOrder, StageOutcome};
use crate::infra::InMemoryTargetSource;

/// Sleeps for the stage's planned duration, then applies the operation to the target
/// held by an [`InMemoryTargetSource`].
///
/// Hack removes `threads × extract_fraction_per_thread` of the current resource and
/// reports the amount; grow multiplies the resource by `(1 + growth_per_thread)^threads`
/// (capped at the maximum) and reports the multiplier; weaken lowers security (floored
/// at the minimum) and reports the reduction. Hack and grow raise security by the
/// configured per-thread deltas.
#[derive(Clone)]
pub struct SimulatedStageExecutor {
    targets: Arc<InMemoryTargetSource>,
    threads: ThreadConfig,
}

impl SimulatedStageExecutor {
    /// Create an executor mutating `targets`.
    #[must_use]
    pub const fn new(targets: Arc<InMemoryTargetSource>, threads: ThreadConfig) -> Self {
        Self { targets, threads }
    }
}

#[async_trait]
impl StageExecutor for SimulatedStageExecutor {
    async fn execute(&self, order: StageOrder) -> StageOutcome {
        tokio::time::sleep(Duration::from_millis(order.duration_ms)).await;

        let threads = f64::from(order.threads);
        let cfg = &self.threads;
        let mut value = 0.0;
        let found = self.targets.update(&order.target, |t| match order.kind.operation() {
            Operation::Hack => {
                let share = (threads * t.extract_fraction_per_thread).min(1.0);
                value = t.current_resource * share;
                t.current_resource -= value;
                t.security_current += threads * cfg.hack_security_increase;
            }
            Operation::Grow => {
                let multiplier = (1.0 + t.growth_per_thread).powf(threads);
                let grown = (t.current_resource.max(1.0) * multiplier).min(t.max_resource);
                value = if t.current_resource > 0.0 {
                    grown / t.current_resource
                } else {
                    multiplier
                };
                t.current_resource = grown;
                t.security_current += threads * cfg.grow_security_increase;
            }
            Operation::Weaken => {
                let lowered = (t.security_current - threads * cfg.weaken_security_decrease)
                    .max(t.security_min);
                value = t.security_current - lowered;
                t.security_current = lowered;
            }
        });

        StageOutcome {
            success: found,
            value,
        }
    }
}
