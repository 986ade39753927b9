//! Pending submission records and the persisted buffer mapping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::details::TransactionDetails;
use crate::id::OrderId;

/// Persisted value for one order in the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub payload: TransactionDetails,
    pub queued_at: DateTime<Utc>,
}

/// One not-yet-acknowledged payment submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub order_id: OrderId,
    pub payload: TransactionDetails,
    pub queued_at: DateTime<Utc>,
}

/// The whole persisted buffer: `order id -> entry`.
///
/// At most one entry exists per order id; inserting for an existing id
/// replaces the previous entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingQueue(BTreeMap<OrderId, QueueEntry>);

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `order_id`, returning the replaced entry.
    pub fn upsert(
        &mut self,
        order_id: OrderId,
        payload: TransactionDetails,
        queued_at: DateTime<Utc>,
    ) -> Option<QueueEntry> {
        self.0.insert(order_id, QueueEntry { payload, queued_at })
    }

    pub fn remove(&mut self, order_id: &OrderId) -> Option<QueueEntry> {
        self.0.remove(order_id)
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&QueueEntry> {
        self.0.get(order_id)
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.0.contains_key(order_id)
    }

    /// The record for `order_id`, if one is pending.
    pub fn record_for(&self, order_id: &OrderId) -> Option<PendingRecord> {
        self.0.get(order_id).map(|entry| PendingRecord {
            order_id: order_id.clone(),
            payload: entry.payload.clone(),
            queued_at: entry.queued_at,
        })
    }

    pub fn order_ids(&self) -> impl Iterator<Item = &OrderId> {
        self.0.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = PendingRecord> + '_ {
        self.0.iter().map(|(order_id, entry)| PendingRecord {
            order_id: order_id.clone(),
            payload: entry.payload.clone(),
            queued_at: entry.queued_at,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
