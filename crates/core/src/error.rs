//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures (validation, malformed input).
/// Storage and transport concerns belong to the crates that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. missing checkout field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. empty order id).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// No order identifier could be derived from the page's order context.
    #[error("no order context in {0:?}")]
    MalformedContext(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn malformed_context(url: impl Into<String>) -> Self {
        Self::MalformedContext(url.into())
    }
}
