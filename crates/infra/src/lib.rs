//! Infrastructure layer: durable storage, serialized access, and the
//! pending-record repository built on top of them.

pub mod executor;
pub mod repository;
pub mod store;

pub use executor::{SerializedAccess, SerializedExecutor};
pub use repository::{AddOutcome, DEFAULT_STORAGE_KEY, PendingRecordRepository, PersistenceError};
pub use store::{DurableStore, InMemoryStore, SqliteStore, StoreError};
