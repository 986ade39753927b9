use async_trait::async_trait;

use txrelay_core::CheckoutProof;

/// Receives the events the bridge accepted from the trusted payment UI.
///
/// Handlers run on the bridge task, one event at a time; a slow handler delays
/// the next event but never reorders them.
#[async_trait]
pub trait CheckoutHandler: Send + Sync {
    /// The payment UI reported a completed checkout.
    async fn on_checkout(&self, proof: CheckoutProof);

    /// The payment UI asked to be dismissed.
    async fn on_close(&self);
}
