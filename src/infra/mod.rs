//! In-memory collaborators and completion channels.

pub mod channel;
pub mod inventory;
pub mod targets;

pub use channel::{completion_channel, SignalSender};
pub use inventory::InMemoryInventory;
pub use targets::InMemoryTargetSource;
