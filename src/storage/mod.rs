//! Storage Engine
//!
//! In-memory key-value store with TTL support, batched execution, and
//! the atomic budget reservation primitive.

mod budget;
mod multi;
mod pattern;
mod store;
mod sweeper;

pub use multi::{Multi, Reply, StoreCommand};
pub use pattern::PatternCache;
pub use store::{KeyScan, Store};
pub use sweeper::Sweeper;
