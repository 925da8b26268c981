//! Hysteresis controller for the concurrency ceiling.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::UtilizationConfig;

/// Adjustment made by one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControllerAction {
    /// Nothing changed.
    Hold,
    /// Ceiling lowered to the contained value.
    CeilingDecreased(u32),
    /// Ceiling raised to the contained value.
    CeilingIncreased(u32),
    /// Ceiling at maximum; padding raised to the contained value.
    PaddingIncreased(f64),
}

/// Adjusts the concurrency ceiling from sustained utilization.
///
/// Sustained high utilization lowers the ceiling (never below 1). Sustained low
/// utilization raises it up to `max_ceiling`, then raises the padding multiplier
/// applied to grow and weaken threads. Samples inside the neutral band reset both
/// streaks.
#[derive(Debug, Clone)]
pub struct UtilizationController {
    config: UtilizationConfig,
    max_ceiling: u32,
    ceiling: u32,
    padding: f64,
    history: VecDeque<f64>,
    high_streak: u32,
    low_streak: u32,
}

impl UtilizationController {
    /// Create a controller starting at `max_ceiling` and the base padding.
    #[must_use]
    pub fn new(config: UtilizationConfig, max_ceiling: u32) -> Self {
        let max_ceiling = max_ceiling.max(1);
        Self {
            padding: config.base_padding,
            history: VecDeque::with_capacity(config.history_len),
            config,
            max_ceiling,
            ceiling: max_ceiling,
            high_streak: 0,
            low_streak: 0,
        }
    }

    /// Current concurrency ceiling.
    #[must_use]
    pub const fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Current padding multiplier.
    #[must_use]
    pub const fn padding(&self) -> f64 {
        self.padding
    }

    /// Consecutive high samples.
    #[must_use]
    pub const fn high_streak(&self) -> u32 {
        self.high_streak
    }

    /// Consecutive low samples.
    #[must_use]
    pub const fn low_streak(&self) -> u32 {
        self.low_streak
    }

    /// Recent samples, oldest first.
    #[must_use]
    pub const fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    /// Mean of the recorded samples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        if self.history.is_empty() {
            None
        } else {
            Some(self.history.iter().sum::<f64>() / self.history.len() as f64)
        }
    }

    /// Record one utilization sample in `[0, 1]`.
    pub fn record(&mut self, sample: f64) -> ControllerAction {
        let sample = sample.clamp(0.0, 1.0);
        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        if sample >= self.config.high_water {
            self.low_streak = 0;
            self.high_streak += 1;
            if self.high_streak >= self.config.high_samples {
                self.high_streak = 0;
                if self.ceiling > 1 {
                    self.ceiling -= 1;
                    info!(
                        ceiling = self.ceiling,
                        sample,
                        "sustained high utilization; ceiling lowered"
                    );
                    return ControllerAction::CeilingDecreased(self.ceiling);
                }
            }
        } else if sample <= self.config.low_water {
            self.high_streak = 0;
            self.low_streak += 1;
            if self.low_streak >= self.config.low_samples {
                self.low_streak = 0;
                if self.ceiling < self.max_ceiling {
                    self.ceiling += 1;
                    info!(
                        ceiling = self.ceiling,
                        sample,
                        "sustained low utilization; ceiling raised"
                    );
                    return ControllerAction::CeilingIncreased(self.ceiling);
                }
                let padded = (self.padding + self.config.padding_step).min(self.config.max_padding);
                if padded > self.padding {
                    self.padding = padded;
                    info!(padding = self.padding, "ceiling at maximum; padding raised");
                    return ControllerAction::PaddingIncreased(self.padding);
                }
            }
        } else {
            self.high_streak = 0;
            self.low_streak = 0;
        }
        ControllerAction::Hold
    }
}
