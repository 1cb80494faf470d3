//! Versioned, multi-bucket response cache.
//!
//! This module provides:
//! - Bucket naming per cache generation (static, dynamic, legacy umbrella)
//! - A named-bucket storage trait with a SQLite backend (and an in-memory one in tests)
//! - The cache-first and network-first strategies built on top of it

mod buckets;
mod layer;
#[cfg(test)]
mod memory;
mod storage;
mod traits;

pub use buckets::BucketNames;
pub use layer::CacheLayer;
#[cfg(test)]
pub use memory::MemoryStorage;
pub use storage::SqliteStorage;
pub use traits::{entry_key, CacheResult, CacheSource, CacheStorage, CachedResponse};
