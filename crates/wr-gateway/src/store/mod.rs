//! Persistent tenant state stores

mod json;
mod memory;

pub use json::JsonStateStore;
pub use memory::MemoryStateStore;
