//! Durable key/value storage boundary.
//!
//! The buffer persists a single value under a single namespaced key, so the
//! contract is deliberately tiny: `get` and `set` of string values. Anything
//! smarter (encoding, merging, locking) lives above this layer.

pub mod in_memory;
pub mod sqlite;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use r#trait::{DurableStore, StoreError};
pub use sqlite::SqliteStore;
