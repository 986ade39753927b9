//! Signed payment proof produced by the embedded payment UI.

use serde::{Deserialize, Serialize};

use crate::details::{TransactionDetails, fields};
use crate::error::{DomainError, DomainResult};

/// Proof that a payment was made: the sender's signature over a message plus
/// the on-chain transaction that carried the payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutProof {
    pub sender_address: String,
    pub signature: String,
    /// The message that was signed, kept as structured JSON.
    pub signed_message: serde_json::Value,
    pub transaction_hash: String,
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}

impl CheckoutProof {
    /// Check the fields the server cannot do without.
    pub fn validate(&self) -> DomainResult<()> {
        if self.sender_address.trim().is_empty() {
            return Err(DomainError::validation("checkout proof without sender address"));
        }
        if self.signature.trim().is_empty() {
            return Err(DomainError::validation("checkout proof without signature"));
        }
        if self.transaction_hash.trim().is_empty() {
            return Err(DomainError::validation("checkout proof without transaction hash"));
        }
        Ok(())
    }

    /// Convert into the wire form submitted to the transaction details endpoint.
    ///
    /// The signed message is sent as a JSON string; the server treats it as a blob.
    pub fn to_transaction_details(&self) -> TransactionDetails {
        let mut details = TransactionDetails::new()
            .with(fields::SENDER_ADDRESS, self.sender_address.clone())
            .with(fields::SIGNATURE, self.signature.clone())
            .with(fields::MESSAGE, self.signed_message.to_string())
            .with(fields::TRANSACTION_HASH, self.transaction_hash.clone())
            .with(fields::CHAIN_ID, self.chain_id.to_string());

        if let Some(name) = &self.chain_name {
            details.insert(fields::CHAIN_NAME, name.clone());
        }
        if let Some(url) = &self.receipt_url {
            details.insert(fields::RECEIPT_URL, url.clone());
        }
        details
    }
}
