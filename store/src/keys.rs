//! Key encoding utilities for `RocksDB`.
//!
//! User ids are variable-length strings, so composite keys join the user id
//! and the suffix with a `0x00` separator. `UserId` construction rejects
//! control characters, which keeps the prefix unambiguous.

use payflow_core::{EventId, OrderId, UserId};

/// Separator between the user id and the suffix in composite keys.
const SEP: u8 = 0x00;

/// Create an account key from a user id.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create an order key from an order id.
#[must_use]
pub fn order_key(order_id: &OrderId) -> Vec<u8> {
    order_id.to_bytes().to_vec()
}

/// Create an outbox key from an event id.
#[must_use]
pub fn outbox_key(event_id: &EventId) -> Vec<u8> {
    event_id.to_bytes().to_vec()
}

/// Create a user-order index key.
///
/// Format: `user_id || 0x00 || order_id (16 bytes)`.
///
/// Since ULIDs are time-ordered, a user's index entries sort by creation
/// time.
#[must_use]
pub fn user_order_key(user_id: &UserId, order_id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.as_bytes().len() + 17);
    key.extend_from_slice(user_id.as_bytes());
    key.push(SEP);
    key.extend_from_slice(&order_id.to_bytes());
    key
}

/// Create a prefix for iterating all index entries for a user.
#[must_use]
pub fn user_orders_prefix(user_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.as_bytes().len() + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.push(SEP);
    key
}

/// Create an idempotency key for `(user_id, idempotency_key)`.
#[must_use]
pub fn idempotency_key(user_id: &UserId, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(user_id.as_bytes().len() + 1 + key.len());
    out.extend_from_slice(user_id.as_bytes());
    out.push(SEP);
    out.extend_from_slice(key.as_bytes());
    out
}
