//! Efficiency scoring and hysteresis-guarded target selection.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SelectionConfig;
use crate::core::error::SchedulerError;
use crate::core::model::{ScoredTarget, Target};

/// Share of the maximum resource assumed extractable when the target is drained.
const CONSERVATIVE_RESOURCE_SHARE: f64 = 0.5;

/// Source of target data.
pub trait TargetSource {
    /// Host names eligible for evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Backend`] when the source cannot be read.
    fn candidates(&self) -> Result<Vec<String>, SchedulerError>;

    /// Current operator skill level.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Backend`] when the source cannot be read.
    fn skill_level(&self) -> Result<u32, SchedulerError>;

    /// Fresh data for one host, `None` if unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Backend`] when the source cannot be read.
    fn target(&self, hostname: &str) -> Result<Option<Target>, SchedulerError>;
}

impl<S: TargetSource + ?Sized> TargetSource for std::sync::Arc<S> {
    fn candidates(&self) -> Result<Vec<String>, SchedulerError> {
        (**self).candidates()
    }

    fn skill_level(&self) -> Result<u32, SchedulerError> {
        (**self).skill_level()
    }

    fn target(&self, hostname: &str) -> Result<Option<Target>, SchedulerError> {
        (**self).target(hostname)
    }
}

/// Fetch data for every candidate host the source knows.
///
/// # Errors
///
/// Propagates source failures.
pub fn fetch_candidates<S: TargetSource + ?Sized>(
    source: &S,
) -> Result<Vec<Target>, SchedulerError> {
    let mut targets = Vec::new();
    for host in source.candidates()? {
        if let Some(target) = source.target(&host)? {
            targets.push(target);
        }
    }
    Ok(targets)
}

/// Efficiency of a target, or `None` if it is not viable at `skill`.
///
/// `max(current, max/2) × success chance × skill ratio ÷ slowest operation`, where the
/// skill ratio `1 − required / 2·skill` favours targets well below the operator's level.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn efficiency(target: &Target, skill: u32) -> Option<f64> {
    if !target.has_access || skill == 0 || target.required_skill > skill {
        return None;
    }
    if target.max_resource <= 0.0 {
        return None;
    }
    let d = &target.durations;
    if d.hack_ms == 0 || d.grow_ms == 0 || d.weaken_ms == 0 {
        return None;
    }
    let slowest = d.slowest();

    let expected = target
        .current_resource
        .max(target.max_resource * CONSERVATIVE_RESOURCE_SHARE);
    let skill_ratio = 1.0 - f64::from(target.required_skill) / (2.0 * f64::from(skill));
    let chance = target.success_chance.clamp(0.0, 1.0);
    Some(expected * chance * skill_ratio / slowest as f64)
}

/// Score every viable candidate.
#[must_use]
pub fn score(candidates: &[Target], skill: u32) -> Vec<ScoredTarget> {
    candidates
        .iter()
        .filter_map(|t| {
            efficiency(t, skill).map(|efficiency| ScoredTarget {
                target: t.clone(),
                efficiency,
            })
        })
        .collect()
}

/// The currently selected target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected host name.
    pub hostname: String,
    /// Efficiency recorded when the target was selected.
    pub efficiency: f64,
    /// Time of selection.
    pub selected_at_ms: u64,
}

/// Why the selection moved to another target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchReason {
    /// A candidate beats the recorded efficiency by the improvement threshold.
    BetterCandidate,
    /// The current target's fresh efficiency fell below the drop threshold.
    EfficiencyDropped,
    /// The current target's resource ratio fell below the depleted threshold.
    ResourceDepleted,
}

/// Result of one call to [`TargetSelector::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Called before the re-evaluation interval elapsed; nothing changed.
    RateLimited,
    /// First target selected.
    Initial,
    /// Current selection kept.
    Retained,
    /// Selection moved to another target.
    Switched {
        /// Previously selected host.
        from: String,
        /// Trigger.
        reason: SwitchReason,
    },
    /// No candidate was viable; previous selection (if any) kept.
    NoViableCandidate,
}

/// Selects the target waves are scheduled against.
#[derive(Debug, Clone)]
pub struct TargetSelector {
    config: SelectionConfig,
    current: Option<Selection>,
    last_evaluated_ms: Option<u64>,
}

impl TargetSelector {
    /// Create a selector with no selection.
    #[must_use]
    pub const fn new(config: SelectionConfig) -> Self {
        Self {
            config,
            current: None,
            last_evaluated_ms: None,
        }
    }

    /// Current selection.
    #[must_use]
    pub const fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    /// Whether an evaluation at `now_ms` would run.
    #[must_use]
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.last_evaluated_ms.is_none_or(|last| {
            now_ms.saturating_sub(last) >= self.config.reevaluation_interval_ms
        })
    }

    /// Re-evaluate the selection against fresh candidate data.
    ///
    /// Never fails: without a viable candidate the previous selection stays.
    pub fn evaluate(&mut self, candidates: &[Target], skill: u32, now_ms: u64) -> SelectionOutcome {
        if !self.is_due(now_ms) {
            return SelectionOutcome::RateLimited;
        }
        self.last_evaluated_ms = Some(now_ms);

        let best = score(candidates, skill).into_iter().max_by(|a, b| {
            a.efficiency
                .partial_cmp(&b.efficiency)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.target.hostname.cmp(&a.target.hostname))
        });
        let Some(best) = best else {
            warn!(
                error = %SchedulerError::NoViableTarget,
                candidates = candidates.len(),
                skill,
                retained = self.current.as_ref().map(|s| s.hostname.as_str()),
                "keeping previous selection"
            );
            return SelectionOutcome::NoViableCandidate;
        };

        let Some(current) = self.current.as_mut() else {
            info!(
                host = %best.target.hostname,
                efficiency = best.efficiency,
                "initial target selected"
            );
            self.current = Some(Selection {
                hostname: best.target.hostname,
                efficiency: best.efficiency,
                selected_at_ms: now_ms,
            });
            return SelectionOutcome::Initial;
        };

        let fresh = candidates.iter().find(|t| t.hostname == current.hostname);
        let fresh_efficiency = fresh
            .and_then(|t| efficiency(t, skill))
            .unwrap_or(0.0);
        let best_is_current = best.target.hostname == current.hostname;

        let reason = if !best_is_current
            && best.efficiency > current.efficiency * self.config.improvement_threshold
        {
            Some(SwitchReason::BetterCandidate)
        } else if fresh_efficiency < current.efficiency * self.config.efficiency_drop_threshold {
            Some(SwitchReason::EfficiencyDropped)
        } else if fresh.is_none_or(|t| t.resource_ratio() < self.config.depleted_ratio) {
            Some(SwitchReason::ResourceDepleted)
        } else {
            None
        };

        match reason {
            None => SelectionOutcome::Retained,
            Some(reason) if best_is_current => {
                debug!(
                    host = %current.hostname,
                    ?reason,
                    efficiency = best.efficiency,
                    "switch condition met but current target is still best; re-baselining"
                );
                current.efficiency = best.efficiency;
                current.selected_at_ms = now_ms;
                SelectionOutcome::Retained
            }
            Some(reason) => {
                let from = std::mem::replace(
                    current,
                    Selection {
                        hostname: best.target.hostname,
                        efficiency: best.efficiency,
                        selected_at_ms: now_ms,
                    },
                );
                info!(
                    from = %from.hostname,
                    to = %current.hostname,
                    ?reason,
                    previous_efficiency = from.efficiency,
                    fresh_efficiency,
                    efficiency = current.efficiency,
                    "target switched"
                );
                SelectionOutcome::Switched {
                    from: from.hostname,
                    reason,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::OperationDurations;

    fn config() -> SelectionConfig {
        SelectionConfig {
            reevaluation_interval_ms: 1_000,
            improvement_threshold: 1.2,
            efficiency_drop_threshold: 0.5,
            depleted_ratio: 0.1,
        }
    }

    fn target(hostname: &str, max_resource: f64, weaken_ms: u64) -> Target {
        Target {
            hostname: hostname.into(),
            required_skill: 10,
            max_resource,
            current_resource: max_resource,
            security_current: 5.0,
            security_min: 5.0,
            durations: OperationDurations {
                hack_ms: weaken_ms / 4,
                grow_ms: weaken_ms * 4 / 5,
                weaken_ms,
            },
            success_chance: 1.0,
            has_access: true,
            extract_fraction_per_thread: 0.01,
            growth_per_thread: 0.05,
        }
    }

    #[test]
    fn test_efficiency_formula() {
        let mut t = target("n00dles", 1_000.0, 100);
        t.current_resource = 100.0;
        t.success_chance = 0.5;
        // max(100, 500) * 0.5 * (1 - 10/40) / 100
        let e = efficiency(&t, 20).unwrap();
        assert!((e - 1.875).abs() < 1e-9);
    }

    #[test]
    fn test_unviable_targets_have_no_score() {
        let mut locked = target("locked", 1_000.0, 100);
        locked.has_access = false;
        assert!(efficiency(&locked, 50).is_none());

        let hard = target("hard", 1_000.0, 100);
        assert!(efficiency(&hard, 5).is_none());

        let empty = target("empty", 0.0, 100);
        assert!(efficiency(&empty, 50).is_none());
    }

    #[test]
    fn test_selection_is_stable_with_unchanged_inputs() {
        let mut selector = TargetSelector::new(config());
        let candidates = vec![target("a", 1_000.0, 100), target("b", 900.0, 100)];

        assert_eq!(selector.evaluate(&candidates, 50, 0), SelectionOutcome::Initial);
        for step in 1..10 {
            assert_eq!(
                selector.evaluate(&candidates, 50, step * 1_000),
                SelectionOutcome::Retained
            );
        }
        assert_eq!(selector.current().unwrap().hostname, "a");
    }

    #[test]
    fn test_rate_limit() {
        let mut selector = TargetSelector::new(config());
        let candidates = vec![target("a", 1_000.0, 100)];
        selector.evaluate(&candidates, 50, 0);
        assert!(!selector.is_due(999));
        assert_eq!(
            selector.evaluate(&candidates, 50, 999),
            SelectionOutcome::RateLimited
        );
        assert!(selector.is_due(1_000));
    }

    #[test]
    fn test_switches_to_clearly_better_candidate() {
        let mut selector = TargetSelector::new(config());
        selector.evaluate(&[target("a", 1_000.0, 100)], 50, 0);

        // 1.1x better is inside the hysteresis band.
        let close = vec![target("a", 1_000.0, 100), target("b", 1_100.0, 100)];
        assert_eq!(selector.evaluate(&close, 50, 1_000), SelectionOutcome::Retained);

        let far = vec![target("a", 1_000.0, 100), target("b", 1_300.0, 100)];
        assert_eq!(
            selector.evaluate(&far, 50, 2_000),
            SelectionOutcome::Switched {
                from: "a".into(),
                reason: SwitchReason::BetterCandidate
            }
        );
        assert_eq!(selector.current().unwrap().hostname, "b");
    }

    #[test]
    fn test_switches_when_current_efficiency_drops() {
        let mut selector = TargetSelector::new(config());
        let a = target("a", 1_000.0, 100);
        let b = target("b", 800.0, 100);
        selector.evaluate(&[a.clone(), b.clone()], 50, 0);

        let mut slow_a = a;
        slow_a.durations.weaken_ms = 300;
        assert_eq!(
            selector.evaluate(&[slow_a, b], 50, 1_000),
            SelectionOutcome::Switched {
                from: "a".into(),
                reason: SwitchReason::EfficiencyDropped
            }
        );
    }

    #[test]
    fn test_switches_when_current_is_depleted() {
        let mut selector = TargetSelector::new(config());
        let a = target("a", 1_000.0, 100);
        let b = target("b", 950.0, 100);
        selector.evaluate(&[a.clone(), b.clone()], 50, 0);

        // Conservative expected resource keeps the score above the drop threshold.
        let mut drained = a;
        drained.current_resource = 50.0;
        assert_eq!(
            selector.evaluate(&[drained, b], 50, 1_000),
            SelectionOutcome::Switched {
                from: "a".into(),
                reason: SwitchReason::ResourceDepleted
            }
        );
    }

    #[test]
    fn test_no_viable_candidate_keeps_selection() {
        let mut selector = TargetSelector::new(config());
        selector.evaluate(&[target("a", 1_000.0, 100)], 50, 0);
        assert_eq!(
            selector.evaluate(&[target("a", 1_000.0, 100)], 1, 1_000),
            SelectionOutcome::NoViableCandidate
        );
        assert_eq!(selector.current().unwrap().hostname, "a");
    }
}
