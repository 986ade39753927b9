//! Starting a payment and taking in the proof the payment UI hands back.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use txrelay_core::{CheckoutProof, DomainError};
use txrelay_events::CheckoutHandler;
use txrelay_infra::{AddOutcome, PendingRecordRepository, PersistenceError};
use url::Url;

use crate::context::PageContext;
use crate::presenter::Presenter;
use crate::transport::TransportError;
use crate::worker::WorkerWaker;

pub const ALREADY_PAID_MESSAGE: &str = "It seems that you have paid for this order already.";
pub const DETAILS_UNAVAILABLE_MESSAGE: &str =
    "Failed to fetch order details. If this problem persists, please contact the organizer directly.";

/// Payment parameters served by the transaction details endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentDetails {
    /// Amount due, full-precision decimal string.
    pub amount: String,
    pub primary_currency: String,
    #[serde(default)]
    pub usd_per_eth: Option<String>,
    pub recipient_address: String,
    pub is_signature_submitted: bool,
    #[serde(rename = "3cities_interface_domain", default)]
    pub interface_domain: Option<String>,
}

#[async_trait]
pub trait PaymentDetailsSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<PaymentDetails, TransportError>;
}

/// `GET` of the transaction details endpoint.
#[derive(Debug, Clone, Default)]
pub struct PaymentDetailsClient {
    client: reqwest::Client,
}

impl PaymentDetailsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentDetailsSource for PaymentDetailsClient {
    async fn fetch(&self, url: &Url) -> Result<PaymentDetails, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(TransportError::Status(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result of trying to start a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStart {
    /// Open the payment UI with these details.
    Ready(PaymentDetails),
    /// The server already holds a signature for this order.
    AlreadyPaid,
}

/// Page-side checkout: guards the start of a payment and queues the proof
/// delivered by the payment UI.
pub struct CheckoutFlow {
    repository: PendingRecordRepository,
    context: PageContext,
    presenter: Arc<dyn Presenter>,
    details: Arc<dyn PaymentDetailsSource>,
    waker: WorkerWaker,
}

impl CheckoutFlow {
    pub fn new(
        repository: PendingRecordRepository,
        context: PageContext,
        presenter: Arc<dyn Presenter>,
        details: Arc<dyn PaymentDetailsSource>,
        waker: WorkerWaker,
    ) -> Self {
        Self {
            repository,
            context,
            presenter,
            details,
            waker,
        }
    }

    /// Refresh payment details and decide whether a payment may start.
    pub async fn begin_payment(&self) -> Result<PaymentStart, CheckoutError> {
        self.presenter.clear_error();

        let details = match self.details.fetch(self.context.transaction_details_url()).await {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!(error = %e, "payment details unavailable");
                self.presenter.show_error(DETAILS_UNAVAILABLE_MESSAGE);
                return Err(e.into());
            }
        };

        if details.is_signature_submitted {
            self.presenter.show_error(ALREADY_PAID_MESSAGE);
            return Ok(PaymentStart::AlreadyPaid);
        }

        tracing::info!(amount = %details.amount, currency = %details.primary_currency, "payment started");
        Ok(PaymentStart::Ready(details))
    }

    /// Queue `proof` for delivery under this page's order and wake the worker.
    pub async fn accept_checkout(&self, proof: CheckoutProof) -> Result<AddOutcome, CheckoutError> {
        proof.validate()?;
        let order_id = self.context.order_id()?;
        let details = proof.to_transaction_details();

        let outcome = self.repository.add(order_id.clone(), details).await?;
        tracing::info!(
            order_id = %order_id,
            transaction_hash = %proof.transaction_hash,
            chain_id = proof.chain_id,
            ?outcome,
            "checkout queued for delivery"
        );

        self.presenter.close_checkout();
        self.waker.wake();
        Ok(outcome)
    }
}

#[async_trait]
impl CheckoutHandler for CheckoutFlow {
    async fn on_checkout(&self, proof: CheckoutProof) {
        let transaction_hash = proof.transaction_hash.clone();
        let chain_id = proof.chain_id;

        if let Err(e) = self.accept_checkout(proof).await {
            tracing::error!(error = %e, transaction_hash = %transaction_hash, "checkout could not be queued");
            self.presenter.show_error(&format!(
                "Your payment could not be recorded. Please contact support and save these details: \
                 Your payment was sent in transaction {transaction_hash} (chain ID {chain_id})."
            ));
        }
    }

    async fn on_close(&self) {
        self.presenter.close_checkout();
    }
}
