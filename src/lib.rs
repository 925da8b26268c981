//! # Wave Batcher
//!
//! A wave batch scheduler and completion-tracking engine for repeating four-stage
//! extraction cycles against remote targets.
//!
//! Every batch is one hack → weaken → grow → weaken cycle. The four stages are
//! dispatched fire-and-forget onto worker nodes with start delays computed backwards
//! from a common anchor, so that their *end* times land in strict order, each
//! separated by a fixed spacing. Completion is reported later, out of band, as
//! plain-text signals on a shared channel.
//!
//! ## Core Problem Solved
//!
//! - **Strict ordering under asynchronous reporting**: stage order depends only on the
//!   start delays produced by the [`core::TimingPlanner`], never on dispatch or
//!   completion order.
//! - **Bounded resource consumption**: the [`core::WaveScheduler`] caps in-flight
//!   batches by a concurrency ceiling, the target cycle length and live worker capacity.
//! - **Unreliable completion signals**: the [`core::CompletionTracker`] drops malformed,
//!   late and duplicated signals and evicts batches that miss their deadline.
//! - **Adaptivity**: the [`core::TargetSelector`] and [`core::UtilizationController`]
//!   re-tune target and concurrency with hysteresis.
//!
//! ## Control Loop
//!
//! ```rust,ignore
//! use wave_batcher::builders::EngineBuilder;
//! use wave_batcher::config::SchedulerConfig;
//! use wave_batcher::infra::channel::completion_channel;
//!
//! let config = SchedulerConfig::from_env()?;
//! let (signals, receiver) = completion_channel(None);
//!
//! let (builder, audit) = EngineBuilder::new(config).with_audit_capacity(1_000);
//! let mut engine = builder.build(inventory, targets, dispatcher, receiver)?;
//!
//! // One tick: drain → sweep → select → schedule → utilization.
//! let report = engine.tick(now_ms())?;
//!
//! // Or run until the shutdown flag is raised.
//! engine.run(shutdown).await;
//! ```
//!
//! For complete examples, see:
//! - `tests/engine_test.rs` - ticks against in-memory collaborators
//! - `tests/local_runtime_test.rs` - end-to-end batches on the tokio runtime

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling, timing, tracking and selection.
pub mod core;
/// Configuration models for the scheduler.
pub mod config;
/// Builders to construct the engine from configuration.
pub mod builders;
/// In-memory collaborators and completion channels.
pub mod infra;
/// Runtime adapters and status API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
