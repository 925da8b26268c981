//! Configuration models for the scheduler.

pub mod scheduler;

pub use scheduler::{
    SchedulerConfig, SelectionConfig, StageCostConfig, ThreadConfig, TimingConfig,
    UtilizationConfig, CONFIG_PATH_ENV,
};
