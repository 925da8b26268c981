//! Backward timing of the four stages of a batch.
//!
//! The planner anchors the last stage's end time and walks backwards in steps of the
//! cycle spacing `g`:
//!
//! ```text
//! stage4End = start + max(hack, grow, weaken) + 3g
//! stage3End = stage4End - g
//! stage2End = stage3End - g
//! stage1End = stage2End - g
//! delay(s)  = max(0, stageEnd(s) - start - duration(s))
//! ```
//!
//! Hack and grow both raise security, so each is followed by a weaken that lands
//! exactly `g` later. The spacing absorbs jitter between dispatch and execution on
//! independent workers.

use serde::{Deserialize, Serialize};

use crate::core::model::{OperationDurations, StageKind};

/// Start delays and end times of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTiming {
    /// Batch start time all delays are relative to.
    pub start_ms: u64,
    /// Start delay of each stage, indexed by [`StageKind::index`].
    pub start_delays_ms: [u64; 4],
    /// Absolute end time of each stage, indexed by [`StageKind::index`].
    pub end_times_ms: [u64; 4],
    /// Run time of each stage, indexed by [`StageKind::index`].
    pub durations_ms: [u64; 4],
}

impl BatchTiming {
    /// Delay between batch start and the stage's start.
    #[must_use]
    pub const fn start_delay(&self, kind: StageKind) -> u64 {
        self.start_delays_ms[kind.index()]
    }

    /// Absolute start time of a stage.
    #[must_use]
    pub const fn start_at(&self, kind: StageKind) -> u64 {
        self.start_ms + self.start_delays_ms[kind.index()]
    }

    /// Absolute end time of a stage.
    #[must_use]
    pub const fn end(&self, kind: StageKind) -> u64 {
        self.end_times_ms[kind.index()]
    }

    /// Run time of a stage.
    #[must_use]
    pub const fn duration(&self, kind: StageKind) -> u64 {
        self.durations_ms[kind.index()]
    }

    /// Latest absolute start time among the four stages.
    #[must_use]
    pub fn last_start(&self) -> u64 {
        StageKind::ALL
            .into_iter()
            .map(|kind| self.start_at(kind))
            .max()
            .unwrap_or(self.start_ms)
    }

    /// Time from batch start to the end of the last stage.
    #[must_use]
    pub const fn total_duration(&self) -> u64 {
        self.end_times_ms[3] - self.start_ms
    }
}

/// Computes [`BatchTiming`]s for a fixed spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPlanner {
    spacing_ms: u64,
}

impl TimingPlanner {
    /// Create a planner with spacing `g`.
    #[must_use]
    pub const fn new(spacing_ms: u64) -> Self {
        Self { spacing_ms }
    }

    /// The spacing `g`.
    #[must_use]
    pub const fn spacing(&self) -> u64 {
        self.spacing_ms
    }

    /// Plan a batch starting at `start_ms`.
    #[must_use]
    pub fn plan(&self, durations: &OperationDurations, start_ms: u64) -> BatchTiming {
        let g = self.spacing_ms;
        let last_end = start_ms + durations.slowest() + 3 * g;

        let mut end_times_ms = [0; 4];
        for kind in StageKind::ALL {
            let steps_back = 3 - kind.index() as u64;
            end_times_ms[kind.index()] = last_end - steps_back * g;
        }

        let durations_ms = StageKind::ALL.map(|kind| durations.stage(kind));
        let start_delays_ms = StageKind::ALL.map(|kind| {
            (end_times_ms[kind.index()] - start_ms).saturating_sub(durations_ms[kind.index()])
        });

        BatchTiming {
            start_ms,
            start_delays_ms,
            end_times_ms,
            durations_ms,
        }
    }
}
