//! Table backends
//!
//! The engine only reads tables through `engine::TableSource`; `memory`
//! provides a chunked in-memory backend for embedding and tests.

pub mod engine;
pub mod memory;

pub use engine::{ColumnFetch, TableIterator, TableSource};
pub use memory::MemoryTable;
