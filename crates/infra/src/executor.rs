//! Per-resource FIFO serialization of read-modify-write cycles.
//!
//! Every operation against a resource name waits for the previous operation on
//! the same name to finish before it starts. The queue position is taken when
//! [`SerializedExecutor::enqueue`] is called, not when the returned future is
//! first polled.
//!
//! Inside an operation, storage is reached through [`SerializedAccess`], which
//! never queues. It is only handed out as the argument of a serialized
//! operation and is revoked when that operation ends: an access that escapes
//! its operation fails every read and write afterwards.
//!
//! An operation must not `enqueue` on its own resource and await the result:
//! it would wait behind itself forever. Use the `SerializedAccess` it was
//! given instead.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::store::{DurableStore, StoreError};

/// Runs operations one at a time per resource name, in call order.
pub struct SerializedExecutor {
    store: Arc<dyn DurableStore>,
    /// Per resource: resolves when the most recently enqueued operation ends.
    tails: Mutex<HashMap<String, oneshot::Receiver<()>>>,
}

impl std::fmt::Debug for SerializedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedExecutor").finish_non_exhaustive()
    }
}

impl SerializedExecutor {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            tails: Mutex::new(HashMap::new()),
        }
    }

    /// Queue `op` behind every operation previously enqueued on `resource`.
    ///
    /// The turn is released when the operation's future completes, panics or
    /// is dropped, so a cancelled caller never wedges the queue.
    pub fn enqueue<F, Fut, T>(
        &self,
        resource: &str,
        op: F,
    ) -> impl Future<Output = T> + Send + use<F, Fut, T>
    where
        F: FnOnce(SerializedAccess) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let (turn, done) = oneshot::channel::<()>();
        let previous = self
            .tails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource.to_string(), done);

        let live = Arc::new(AtomicBool::new(true));
        let access = SerializedAccess {
            resource: resource.to_string(),
            store: Arc::clone(&self.store),
            live: Arc::clone(&live),
        };

        async move {
            let _turn = turn;
            // Dropped before `_turn`: the access is dead once the next operation starts.
            let _revoke = Revoke(live);
            if let Some(previous) = previous {
                tracing::trace!(resource = %access.resource, "waiting for previous operation");
                // Err only means the previous holder dropped its sender early.
                let _ = previous.await;
            }
            op(access).await
        }
    }
}

/// Clears the access flag when the operation's future completes, panics or is
/// dropped.
struct Revoke(Arc<AtomicBool>);

impl Drop for Revoke {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Un-queued storage access for one resource, handed to a serialized operation.
///
/// Valid only while that operation runs; afterwards reads and writes fail with
/// [`StoreError::Unavailable`].
pub struct SerializedAccess {
    resource: String,
    store: Arc<dyn DurableStore>,
    live: Arc<AtomicBool>,
}

impl std::fmt::Debug for SerializedAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedAccess")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl SerializedAccess {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub async fn read(&self) -> Result<Option<String>, StoreError> {
        self.ensure_live()?;
        self.store.get(&self.resource).await
    }

    pub async fn write(&self, value: &str) -> Result<(), StoreError> {
        self.ensure_live()?;
        self.store.set(&self.resource, value).await
    }

    fn ensure_live(&self) -> Result<(), StoreError> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "access to {} used after its operation ended",
                self.resource
            )))
        }
    }
}
