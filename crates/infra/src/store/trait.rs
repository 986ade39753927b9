use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Storage failure surfaced to callers.
///
/// Stores never swallow failures: a value that could not be written must be
/// reported so the caller can decide what to do with the data it holds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Storage is disabled or cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the write because it is full.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Key/value persistence whose values survive process restarts.
///
/// - `get` of an absent key is `Ok(None)`, not an error
/// - `set` replaces the whole value
/// - no ordering between concurrent callers is promised; callers that
///   read-modify-write must serialize themselves (see `SerializedExecutor`)
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> DurableStore for Arc<S>
where
    S: DurableStore + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }
}
