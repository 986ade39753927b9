//! Typed access to the pending-submission buffer.
//!
//! The buffer is one JSON document under one storage key. Every operation is a
//! full read-modify-write cycle run through the [`SerializedExecutor`] under
//! that key, so concurrent callers never lose each other's updates.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use txrelay_core::{OrderId, PendingQueue, PendingRecord, TransactionDetails};

use crate::executor::{SerializedAccess, SerializedExecutor};
use crate::store::{DurableStore, StoreError};

/// Storage key the buffer lives under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "pretix_eth_transaction_details_buffer";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored value is not a valid buffer document.
    #[error("stored buffer could not be decoded: {0}")]
    Decode(String),

    #[error("buffer could not be encoded: {0}")]
    Encode(String),
}

/// Whether `add` created a record or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone)]
pub struct PendingRecordRepository {
    executor: Arc<SerializedExecutor>,
    key: String,
}

impl PendingRecordRepository {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_key(store, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn DurableStore>, key: impl Into<String>) -> Self {
        Self::from_executor(Arc::new(SerializedExecutor::new(store)), key)
    }

    /// Share an executor with other users of the same store.
    pub fn from_executor(executor: Arc<SerializedExecutor>, key: impl Into<String>) -> Self {
        Self {
            executor,
            key: key.into(),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Store `payload` for `order_id`, replacing any record already pending.
    pub async fn add(
        &self,
        order_id: OrderId,
        payload: TransactionDetails,
    ) -> Result<AddOutcome, PersistenceError> {
        self.executor
            .enqueue(&self.key, move |access| async move {
                let mut queue = load(&access).await?;
                let replaced = queue.upsert(order_id.clone(), payload, Utc::now());
                save(&access, &queue).await?;

                let outcome = match replaced {
                    Some(_) => AddOutcome::Replaced,
                    None => AddOutcome::Inserted,
                };
                tracing::debug!(order_id = %order_id, ?outcome, pending = queue.len(), "record queued");
                Ok(outcome)
            })
            .await
    }

    /// Drop the record for `order_id`. Returns whether one existed; when none
    /// did, nothing is written.
    pub async fn remove(&self, order_id: &OrderId) -> Result<bool, PersistenceError> {
        let order_id = order_id.clone();
        self.executor
            .enqueue(&self.key, move |access| async move {
                let mut queue = load(&access).await?;
                if queue.remove(&order_id).is_none() {
                    return Ok(false);
                }
                save(&access, &queue).await?;
                tracing::debug!(order_id = %order_id, pending = queue.len(), "record removed");
                Ok(true)
            })
            .await
    }

    /// Snapshot of every pending record. The returned value is an owned copy.
    pub async fn list_all(&self) -> Result<PendingQueue, PersistenceError> {
        self.executor
            .enqueue(&self.key, |access| async move { load(&access).await })
            .await
    }

    pub async fn get(&self, order_id: &OrderId) -> Result<Option<PendingRecord>, PersistenceError> {
        Ok(self.list_all().await?.record_for(order_id))
    }
}

async fn load(access: &SerializedAccess) -> Result<PendingQueue, PersistenceError> {
    match access.read().await? {
        Some(raw) => {
            serde_json::from_str(&raw).map_err(|e| PersistenceError::Decode(e.to_string()))
        }
        None => Ok(PendingQueue::new()),
    }
}

async fn save(access: &SerializedAccess, queue: &PendingQueue) -> Result<(), PersistenceError> {
    let raw = serde_json::to_string(queue).map_err(|e| PersistenceError::Encode(e.to_string()))?;
    access.write(&raw).await?;
    Ok(())
}
