//! Target data backends.

pub mod memory;

pub use memory::InMemoryTargetSource;
