//! Origin-checked bridge from window messages to checkout callbacks.
//!
//! The message channel is process-global: any script can post a message shaped
//! like a checkout. The sender's origin, attached by the transport, is the only
//! authentication available, so every message is matched against the trusted
//! origin *before* its body is even parsed.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use txrelay_core::CheckoutProof;

use crate::bus::Subscription;
use crate::envelope::WindowMessage;
use crate::handler::CheckoutHandler;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("message from untrusted origin {0:?}")]
    UntrustedOrigin(String),
    #[error("unexpected message body: {0}")]
    UnexpectedEvent(String),
    #[error("unexpected event kind {0:?}")]
    UnexpectedKind(String),
    #[error("malformed checkout event: {0}")]
    MalformedCheckout(String),
    #[error("invalid trusted origin: {0}")]
    InvalidTrustedOrigin(String),
}

/// Serialized `scheme://host[:port]` origin that messages must come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedOrigin(String);

impl TrustedOrigin {
    /// Derive the origin from the payment UI's base URL.
    ///
    /// Path, query and fragment are dropped, so a base URL such as
    /// `https://pay.example/#/pay?c=...` trusts `https://pay.example`.
    pub fn from_base_url(base_url: &str) -> Result<Self, BridgeError> {
        let url = url::Url::parse(base_url)
            .map_err(|e| BridgeError::InvalidTrustedOrigin(format!("{base_url}: {e}")))?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(BridgeError::InvalidTrustedOrigin(format!(
                "{base_url}: opaque origin"
            )));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison; no normalisation is applied to the claimed origin.
    pub fn matches(&self, origin: &str) -> bool {
        self.0 == origin
    }
}

impl core::fmt::Display for TrustedOrigin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Events of interest emitted by the payment UI.
#[derive(Debug, Clone, PartialEq)]
pub enum IframeEvent {
    Checkout(CheckoutProof),
    CloseIframe,
}

/// Body of a `Checkout` message.
///
/// Field names follow the documented schema; the aliases accept the names used
/// by older payment UI builds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutBody {
    #[serde(default)]
    sender_address: Option<String>,
    #[serde(alias = "caip222StyleSignature")]
    signature: String,
    #[serde(alias = "caip222StyleMessageThatWasSigned", alias = "message")]
    signed_message: serde_json::Value,
    transaction_hash: String,
    chain_id: u64,
    #[serde(default)]
    chain_name: Option<String>,
    #[serde(default)]
    receipt_url: Option<String>,
}

impl CheckoutBody {
    fn into_proof(self) -> Result<CheckoutProof, BridgeError> {
        let sender_address = self
            .sender_address
            .or_else(|| {
                self.signed_message
                    .get("senderAddress")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let proof = CheckoutProof {
            sender_address,
            signature: self.signature,
            signed_message: self.signed_message,
            transaction_hash: self.transaction_hash,
            chain_id: self.chain_id,
            chain_name: self.chain_name,
            receipt_url: self.receipt_url,
        };
        proof
            .validate()
            .map_err(|e| BridgeError::MalformedCheckout(e.to_string()))?;
        Ok(proof)
    }
}

/// Verifies and decodes messages from the embedded payment UI.
#[derive(Debug, Clone)]
pub struct IframeEventBridge {
    trusted: TrustedOrigin,
}

impl IframeEventBridge {
    pub fn new(trusted: TrustedOrigin) -> Self {
        Self { trusted }
    }

    pub fn trusted_origin(&self) -> &TrustedOrigin {
        &self.trusted
    }

    /// Verify the origin, then decode the body.
    pub fn accept(&self, message: &WindowMessage) -> Result<IframeEvent, BridgeError> {
        if !self.trusted.matches(message.origin()) {
            return Err(BridgeError::UntrustedOrigin(message.origin().to_string()));
        }

        let data = message.data();
        let Some(body) = data.as_object() else {
            return Err(BridgeError::UnexpectedEvent(data.to_string()));
        };

        match body.get("kind").and_then(|k| k.as_str()) {
            Some("Checkout") => {
                let checkout: CheckoutBody = serde_json::from_value(data.clone())
                    .map_err(|e| BridgeError::MalformedCheckout(e.to_string()))?;
                Ok(IframeEvent::Checkout(checkout.into_proof()?))
            }
            Some("CloseIframe") => Ok(IframeEvent::CloseIframe),
            Some(other) => Err(BridgeError::UnexpectedKind(other.to_string())),
            None => Err(BridgeError::UnexpectedEvent(data.to_string())),
        }
    }

    /// Accept one message and invoke the matching handler callback.
    ///
    /// Rejected messages are logged and returned as errors; the handler is not
    /// called for them.
    pub async fn dispatch<H>(&self, message: &WindowMessage, handler: &H) -> Result<(), BridgeError>
    where
        H: CheckoutHandler + ?Sized,
    {
        match self.accept(message) {
            Ok(IframeEvent::Checkout(proof)) => {
                info!(
                    transaction_hash = %proof.transaction_hash,
                    chain_id = proof.chain_id,
                    "checkout event received"
                );
                handler.on_checkout(proof).await;
                Ok(())
            }
            Ok(IframeEvent::CloseIframe) => {
                debug!("close event received");
                handler.on_close().await;
                Ok(())
            }
            Err(err @ BridgeError::UntrustedOrigin(_)) => {
                warn!(
                    origin = message.origin(),
                    trusted = %self.trusted,
                    "discarding message from untrusted origin"
                );
                Err(err)
            }
            Err(err) => {
                error!(error = %err, "unexpected event from payment UI");
                Err(err)
            }
        }
    }

    /// Spawn a task that dispatches every message of `subscription` to `handler`.
    ///
    /// The task ends when the bus is dropped or the handle is shut down.
    pub fn spawn<H>(self, mut subscription: Subscription<WindowMessage>, handler: Arc<H>) -> BridgeHandle
    where
        H: CheckoutHandler + ?Sized + 'static,
    {
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();

        let join = tokio::spawn(async move {
            info!(trusted = %self.trusted, "payment UI bridge started");
            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    next = subscription.recv() => match next {
                        Some(message) => {
                            let _ = self.dispatch(&message, handler.as_ref()).await;
                        }
                        None => break,
                    },
                }
            }
            info!("payment UI bridge stopped");
        });

        BridgeHandle { shutdown, join }
    }
}

/// Handle to stop and join a spawned bridge task.
#[derive(Debug)]
pub struct BridgeHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl BridgeHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Request shutdown and wait for the task to stop.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.join.await;
    }
}
