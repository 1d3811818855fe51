//! Work-queue adapters

pub mod memory;

pub use memory::InMemoryWorkQueue;
