//! In-memory target data source.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::core::{SchedulerError, Target, TargetSource};

/// Targets and operator skill held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTargetSource {
    targets: RwLock<BTreeMap<String, Target>>,
    skill: RwLock<u32>,
}

impl InMemoryTargetSource {
    /// Create a source with the given skill level and targets.
    #[must_use]
    pub fn new(skill: u32, targets: impl IntoIterator<Item = Target>) -> Self {
        Self {
            targets: RwLock::new(
                targets
                    .into_iter()
                    .map(|t| (t.hostname.clone(), t))
                    .collect(),
            ),
            skill: RwLock::new(skill),
        }
    }

    /// Insert or replace a target.
    pub fn upsert(&self, target: Target) {
        self.targets.write().insert(target.hostname.clone(), target);
    }

    /// Mutate a target in place. Returns `false` if the host is unknown.
    pub fn update(&self, hostname: &str, f: impl FnOnce(&mut Target)) -> bool {
        self.targets.write().get_mut(hostname).map(f).is_some()
    }

    /// Change the operator skill level.
    pub fn set_skill(&self, skill: u32) {
        *self.skill.write() = skill;
    }
}

impl TargetSource for InMemoryTargetSource {
    fn candidates(&self) -> Result<Vec<String>, SchedulerError> {
        Ok(self.targets.read().keys().cloned().collect())
    }

    fn skill_level(&self) -> Result<u32, SchedulerError> {
        Ok(*self.skill.read())
    }

    fn target(&self, hostname: &str) -> Result<Option<Target>, SchedulerError> {
        Ok(self.targets.read().get(hostname).cloned())
    }
}
