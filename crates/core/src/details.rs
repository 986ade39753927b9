//! Wire-form submission parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known field names of a transaction details submission.
pub mod fields {
    pub const SENDER_ADDRESS: &str = "senderAddress";
    pub const SIGNATURE: &str = "signature";
    pub const MESSAGE: &str = "message";
    pub const TRANSACTION_HASH: &str = "transactionHash";
    pub const CHAIN_ID: &str = "chainId";
    pub const CHAIN_NAME: &str = "chainName";
    pub const RECEIPT_URL: &str = "receiptUrl";
}

/// Opaque `String -> String` mapping submitted as a form body.
///
/// The buffer never validates or rewrites these fields; they are stored and
/// submitted exactly as produced at checkout time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionDetails(BTreeMap<String, String>);

impl TransactionDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        self.get(fields::TRANSACTION_HASH)
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.get(fields::CHAIN_ID)
    }

    pub fn chain_name(&self) -> Option<&str> {
        self.get(fields::CHAIN_NAME)
    }

    pub fn receipt_url(&self) -> Option<&str> {
        self.get(fields::RECEIPT_URL)
    }
}

impl<K, V> FromIterator<(K, V)> for TransactionDetails
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for TransactionDetails {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
