//! Runtime adapters and status API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod local;
#[cfg(feature = "tokio-runtime")]
pub mod simulation;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{health, status, EngineStatus, Health};
#[cfg(feature = "tokio-runtime")]
pub use local::LocalWorkerRuntime;
#[cfg(feature = "tokio-runtime")]
pub use simulation::SimulatedStageExecutor;
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;
