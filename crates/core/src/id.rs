//! Order identifiers and order-context derivation.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Literal path segment that precedes the order identifier in page URLs.
const ORDER_SEGMENT: &str = "order";

/// Identifier of an order, the key of the pending-submission buffer.
///
/// Order ids are opaque strings assigned by the shop. The only constraints are
/// that they are non-empty and form a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::invalid_id("OrderId: empty"));
        }
        if id.contains('/') {
            return Err(DomainError::invalid_id(format!(
                "OrderId: {id:?} spans more than one path segment"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the order id from a page-scoped order context URL.
    ///
    /// Accepts absolute URLs and bare paths shaped like `.../order/{orderId}/...`:
    /// the id is the segment right after the literal `order` segment, and it
    /// must itself be followed by `/`. Query strings and fragments are ignored.
    /// Returns `None` for any other shape.
    pub fn from_context_url(url: &str) -> Option<Self> {
        let path = match url::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => strip_query_and_fragment(url).to_string(),
        };

        let segments: Vec<&str> = path.split('/').collect();
        // segments[0] is whatever precedes the first '/', so `order` only counts
        // from index 1; the id needs a successor segment to prove the trailing '/'.
        (1..segments.len().saturating_sub(2))
            .filter(|&i| segments[i] == ORDER_SEGMENT)
            .find_map(|i| Self::new(segments[i + 1]).ok())
    }

    /// Like [`OrderId::from_context_url`], but reports a missing order context as
    /// [`DomainError::MalformedContext`].
    pub fn require_from_context_url(url: &str) -> DomainResult<Self> {
        Self::from_context_url(url).ok_or_else(|| DomainError::malformed_context(url))
    }
}

fn strip_query_and_fragment(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for OrderId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OrderId> for String {
    fn from(value: OrderId) -> Self {
        value.0
    }
}
