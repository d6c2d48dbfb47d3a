//! Best-effort similarity search over past messages.

mod vector;

pub use vector::{MemoryItem, TinyVectorIndex};
