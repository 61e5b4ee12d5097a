//! Test fixtures shared by the cache, daemon and db scenario tests.

mod fixtures;
mod memory_store;

pub use fixtures::{sample_order, sample_payload};
pub use memory_store::MemoryOrderStore;
