//! Scheduler configuration structures.
//!
//! Every tunable is supplied from outside; the core carries no built-in defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{AppResult, Operation};

/// Environment variable naming the JSON configuration file read by
/// [`SchedulerConfig::from_env`].
pub const CONFIG_PATH_ENV: &str = "WAVE_BATCHER_CONFIG";

/// Timing of batches and of the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Spacing between stage end times and between batch starts.
    pub cycle_spacing_ms: u64,
    /// Offset of the first batch of a wave from the scheduling instant.
    pub queue_delay_ms: u64,
    /// Grace added to a batch's planned duration to form its deadline.
    pub completion_deadline_buffer_ms: u64,
    /// Sleep between ticks.
    pub tick_interval_ms: u64,
    /// Sleep after a failed tick.
    pub error_backoff_ms: u64,
}

/// Capacity cost of one thread per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCostConfig {
    /// Cost of a hack thread.
    pub hack: f64,
    /// Cost of a grow thread.
    pub grow: f64,
    /// Cost of a weaken thread.
    pub weaken: f64,
}

impl StageCostConfig {
    /// Cost of one thread of the given operation.
    #[must_use]
    pub const fn of(&self, op: Operation) -> f64 {
        match op {
            Operation::Hack => self.hack,
            Operation::Grow => self.grow,
            Operation::Weaken => self.weaken,
        }
    }
}

/// Thread planning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadConfig {
    /// Fraction of the target's resource one batch extracts, in `(0, 1)`.
    pub extraction_fraction: f64,
    /// Multiplier applied to the growth a batch must restore (`>= 1`).
    pub growth_buffer: f64,
    /// Security raised by one hack thread.
    pub hack_security_increase: f64,
    /// Security raised by one grow thread.
    pub grow_security_increase: f64,
    /// Security lowered by one weaken thread.
    pub weaken_security_decrease: f64,
    /// Precise per-operation thread cost used for worker selection.
    pub stage_cost: StageCostConfig,
    /// Blanket per-thread cost used for the wave's capacity ceiling.
    pub thread_capacity_estimate: f64,
}

/// Target selection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Minimum time between two evaluations.
    pub reevaluation_interval_ms: u64,
    /// A candidate must beat the current efficiency by this ratio (`> 1`).
    pub improvement_threshold: f64,
    /// Switch when the current efficiency falls below this ratio of its recorded value.
    pub efficiency_drop_threshold: f64,
    /// Switch when the current target's resource ratio falls below this value.
    pub depleted_ratio: f64,
}

/// Utilization feedback controller parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationConfig {
    /// Samples kept in the rolling history.
    pub history_len: usize,
    /// Utilization at or above which a sample counts as high.
    pub high_water: f64,
    /// Utilization at or below which a sample counts as low.
    pub low_water: f64,
    /// Consecutive high samples before the ceiling is lowered.
    pub high_samples: u32,
    /// Consecutive low samples before the ceiling is raised.
    pub low_samples: u32,
    /// Initial padding multiplier.
    pub base_padding: f64,
    /// Padding increment once the ceiling is at its maximum.
    pub padding_step: f64,
    /// Upper bound for the padding multiplier.
    pub max_padding: f64,
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently active batches.
    pub max_concurrent_batches: u32,
    /// Maximum completion signals consumed per tick.
    pub max_signals_per_tick: usize,
    /// Timing section.
    pub timing: TimingConfig,
    /// Thread planning section.
    pub threads: ThreadConfig,
    /// Target selection section.
    pub selection: SelectionConfig,
    /// Utilization controller section.
    pub utilization: UtilizationConfig,
}

fn positive(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be a positive number"))
    }
}

impl TimingConfig {
    /// Validate timing values.
    pub fn validate(&self) -> Result<(), String> {
        if self.cycle_spacing_ms == 0 {
            return Err("cycle_spacing_ms must be greater than 0".into());
        }
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".into());
        }
        if self.error_backoff_ms == 0 {
            return Err("error_backoff_ms must be greater than 0".into());
        }
        Ok(())
    }
}

impl ThreadConfig {
    /// Validate thread planning values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.extraction_fraction > 0.0 && self.extraction_fraction < 1.0) {
            return Err("extraction_fraction must be within (0, 1)".into());
        }
        if !(self.growth_buffer.is_finite() && self.growth_buffer >= 1.0) {
            return Err("growth_buffer must be at least 1".into());
        }
        if !(self.hack_security_increase >= 0.0 && self.grow_security_increase >= 0.0) {
            return Err("security increases must not be negative".into());
        }
        positive("weaken_security_decrease", self.weaken_security_decrease)?;
        positive("stage_cost.hack", self.stage_cost.hack)?;
        positive("stage_cost.grow", self.stage_cost.grow)?;
        positive("stage_cost.weaken", self.stage_cost.weaken)?;
        positive("thread_capacity_estimate", self.thread_capacity_estimate)
    }
}

impl SelectionConfig {
    /// Validate selection thresholds.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.improvement_threshold >= 1.0) {
            return Err("improvement_threshold must be at least 1".into());
        }
        if !(self.efficiency_drop_threshold > 0.0 && self.efficiency_drop_threshold <= 1.0) {
            return Err("efficiency_drop_threshold must be within (0, 1]".into());
        }
        if !(0.0..=1.0).contains(&self.depleted_ratio) {
            return Err("depleted_ratio must be within [0, 1]".into());
        }
        Ok(())
    }
}

impl UtilizationConfig {
    /// Validate controller values.
    pub fn validate(&self) -> Result<(), String> {
        if self.history_len == 0 {
            return Err("history_len must be greater than 0".into());
        }
        if !(0.0..=1.0).contains(&self.low_water) || !(0.0..=1.0).contains(&self.high_water) {
            return Err("water marks must be within [0, 1]".into());
        }
        if self.low_water >= self.high_water {
            return Err("low_water must be below high_water".into());
        }
        if self.high_samples == 0 || self.low_samples == 0 {
            return Err("sample counts must be greater than 0".into());
        }
        positive("base_padding", self.base_padding)?;
        if !(self.padding_step >= 0.0) {
            return Err("padding_step must not be negative".into());
        }
        if !(self.max_padding >= self.base_padding) {
            return Err("max_padding must be at least base_padding".into());
        }
        Ok(())
    }
}

impl SchedulerConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_batches == 0 {
            return Err("max_concurrent_batches must be greater than 0".into());
        }
        if self.max_signals_per_tick == 0 {
            return Err("max_signals_per_tick must be greater than 0".into());
        }
        self.timing.validate().map_err(|e| format!("timing invalid: {e}"))?;
        self.threads.validate().map_err(|e| format!("threads invalid: {e}"))?;
        self.selection
            .validate()
            .map_err(|e| format!("selection invalid: {e}"))?;
        self.utilization
            .validate()
            .map_err(|e| format!("utilization invalid: {e}"))
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or its content is invalid.
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        Self::from_json_str(&raw)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
    }

    /// Load the file named by [`CONFIG_PATH_ENV`], after applying a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Fails when the variable is unset or the file is unreadable or invalid.
    pub fn from_env() -> AppResult<Self> {
        // A missing .env file is not an error; the variable may come from the process.
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_err(|_| anyhow::anyhow!("{CONFIG_PATH_ENV} is not set"))?;
        Self::from_json_file(path)
    }
}
