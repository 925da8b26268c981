//! Worker inventory backends.

pub mod memory;

pub use memory::InMemoryInventory;
