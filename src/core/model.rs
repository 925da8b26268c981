//! Data model shared by the scheduling components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three operations a stage can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Extract resource from the target.
    Hack,
    /// Replenish the target's resource.
    Grow,
    /// Lower the target's security level.
    Weaken,
}

/// One of the four stages of a batch, in end-time order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Stage 1: extraction.
    Hack,
    /// Stage 2: weaken covering the security raised by stage 1.
    WeakenHack,
    /// Stage 3: replenishment.
    Grow,
    /// Stage 4: weaken covering the security raised by stage 3.
    WeakenGrow,
}

impl StageKind {
    /// All stages in end-time order.
    pub const ALL: [Self; 4] = [Self::Hack, Self::WeakenHack, Self::Grow, Self::WeakenGrow];

    /// Position of the stage within a batch (0..4).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Hack => 0,
            Self::WeakenHack => 1,
            Self::Grow => 2,
            Self::WeakenGrow => 3,
        }
    }

    /// Operation executed by this stage.
    #[must_use]
    pub const fn operation(self) -> Operation {
        match self {
            Self::Hack => Operation::Hack,
            Self::Grow => Operation::Grow,
            Self::WeakenHack | Self::WeakenGrow => Operation::Weaken,
        }
    }

    /// Name used in the completion signal wire format.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Hack => "hack",
            Self::WeakenHack => "weaken1",
            Self::Grow => "grow",
            Self::WeakenGrow => "weaken2",
        }
    }

    /// Inverse of [`StageKind::wire_name`].
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Per-operation run times of a target, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDurations {
    /// Hack duration.
    pub hack_ms: u64,
    /// Grow duration.
    pub grow_ms: u64,
    /// Weaken duration (shared by both weaken stages).
    pub weaken_ms: u64,
}

impl OperationDurations {
    /// Duration of a single operation.
    #[must_use]
    pub const fn of(&self, op: Operation) -> u64 {
        match op {
            Operation::Hack => self.hack_ms,
            Operation::Grow => self.grow_ms,
            Operation::Weaken => self.weaken_ms,
        }
    }

    /// Duration of the stage's operation.
    #[must_use]
    pub const fn stage(&self, kind: StageKind) -> u64 {
        self.of(kind.operation())
    }

    /// The slowest of the three operations.
    #[must_use]
    pub fn slowest(&self) -> u64 {
        self.hack_ms.max(self.grow_ms).max(self.weaken_ms)
    }
}

/// Capacity snapshot of one worker node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerNode {
    /// Host name.
    pub hostname: String,
    /// Whether work may be dispatched to this node.
    pub privileged: bool,
    /// Total capacity units.
    pub total_capacity: f64,
    /// Units currently in use.
    pub used_capacity: f64,
    /// Number of cores.
    pub core_count: u32,
}

impl WorkerNode {
    /// Capacity not in use, never negative.
    #[must_use]
    pub fn available(&self) -> f64 {
        (self.total_capacity - self.used_capacity).max(0.0)
    }
}

/// Target state as reported by the target data collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Host name.
    pub hostname: String,
    /// Skill level needed to operate on the target.
    pub required_skill: u32,
    /// Maximum resource the target can hold.
    pub max_resource: f64,
    /// Resource currently held.
    pub current_resource: f64,
    /// Current security level.
    pub security_current: f64,
    /// Security floor.
    pub security_min: f64,
    /// Operation run times.
    pub durations: OperationDurations,
    /// Probability that a hack succeeds, in `[0, 1]`.
    pub success_chance: f64,
    /// Whether operations may be run against the target.
    pub has_access: bool,
    /// Fraction of current resource removed by one hack thread.
    pub extract_fraction_per_thread: f64,
    /// Growth rate contributed by one grow thread (`0.05` = 5 %).
    pub growth_per_thread: f64,
}

impl Target {
    /// Current over maximum resource; zero when the target holds nothing.
    #[must_use]
    pub fn resource_ratio(&self) -> f64 {
        if self.max_resource > 0.0 {
            self.current_resource / self.max_resource
        } else {
            0.0
        }
    }

    /// Security at its floor and resource at its maximum.
    #[must_use]
    pub fn is_optimal(&self) -> bool {
        self.security_current <= self.security_min && self.current_resource >= self.max_resource
    }
}

/// A target together with its derived efficiency score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTarget {
    /// Target data the score was computed from.
    pub target: Target,
    /// Derived efficiency score.
    pub efficiency: f64,
}

/// Thread counts of the four stages, indexed by [`StageKind::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageThreads(pub [u32; 4]);

impl StageThreads {
    /// Threads for one stage.
    #[must_use]
    pub const fn get(&self, kind: StageKind) -> u32 {
        self.0[kind.index()]
    }

    /// Sum over all stages.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}
