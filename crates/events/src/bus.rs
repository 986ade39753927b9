//! Message publishing/subscription abstraction (mechanics only).
//!
//! The payment UI talks to the page through a process-global message channel:
//! anyone able to post a message can post one that *looks* like a checkout.
//! This module keeps that channel behind a small trait so the bridge can be
//! fed by a real window listener, a stdin reader, or a test harness alike.
//!
//! ## Delivery
//!
//! - **Broadcast**: every subscription receives every message published after it subscribed
//! - **Ordered per publisher**: messages from one publisher arrive in publish order
//! - **No persistence**: messages published before `subscribe()` are not replayed

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

/// A subscription to a message stream.
///
/// ```ignore
/// let bus: Arc<dyn MessageBus<WindowMessage, Error = _>> = ...;
/// let mut subscription = bus.subscribe();
///
/// while let Some(message) = subscription.recv().await {
///     process(message);
/// }
/// // `None`: the bus was dropped.
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message; `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Try to receive a message without waiting.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Transport-agnostic pub/sub bus for window messages.
///
/// `publish()` can fail (e.g. the bus is shut down); the error is surfaced to
/// the publisher. Implementations must be safe to share across tasks.
pub trait MessageBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> MessageBus<M> for Arc<B>
where
    B: MessageBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
