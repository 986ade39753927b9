//! `txrelay-core`: domain building blocks for pending payment submissions.
//!
//! This crate contains **pure domain** types (no IO, no async): order
//! identifiers and how they are derived from a page's order context, the opaque
//! wire-form payload of a submission, and the pending-record model persisted by
//! the durable buffer.

pub mod checkout;
pub mod details;
pub mod error;
pub mod id;
pub mod record;

pub use checkout::CheckoutProof;
pub use details::TransactionDetails;
pub use error::{DomainError, DomainResult};
pub use id::OrderId;
pub use record::{PendingQueue, PendingRecord, QueueEntry};
