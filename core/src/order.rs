//! Order types for payflow.
//!
//! An order is written in the same atomic batch as its ledger debit; the
//! per-user order listing is served from a separate, asynchronously built
//! index ([`OrderIndexEntry`]) fed by [`OrderCreated`] events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EventId, OrderId, UserId};

/// A committed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order id (ULID for time-ordering).
    pub order_id: OrderId,

    /// The user who placed the order.
    pub user_id: UserId,

    /// Amount debited from the user's account, in minor currency units.
    pub amount: i64,

    /// Free-text description supplied by the caller.
    pub description: String,

    /// Order status. Orders commit directly in their terminal state.
    pub status: OrderStatus,

    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a new confirmed order.
    #[must_use]
    pub fn new(user_id: UserId, amount: i64, description: String) -> Self {
        Self {
            order_id: OrderId::generate(),
            user_id,
            amount,
            description,
            status: OrderStatus::Confirmed,
            created_at: Utc::now(),
        }
    }
}

/// Status of an order.
///
/// Orders only exist once their debit has committed, so the sole state is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// The debit succeeded and the order is final.
    Confirmed,
}

/// Event emitted when an order commits, consumed by the order index.
///
/// Carries the full order snapshot so the index never has to read the
/// primary records. Delivery is at-least-once; consumers dedupe by
/// `order.order_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    /// Unique event id (ULID, keys the outbox).
    pub event_id: EventId,

    /// When the event was recorded.
    pub occurred_at: DateTime<Utc>,

    /// Snapshot of the committed order.
    pub order: Order,
}

impl OrderCreated {
    /// Build the event for a freshly committed order.
    #[must_use]
    pub fn for_order(order: &Order) -> Self {
        Self {
            event_id: EventId::generate(),
            occurred_at: Utc::now(),
            order: order.clone(),
        }
    }
}

/// Denormalized projection of an [`Order`] in the per-user listing index.
///
/// May lag the primary record; eventually contains every committed order
/// for the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIndexEntry {
    /// The projected order id.
    pub order_id: OrderId,

    /// The owning user.
    pub user_id: UserId,

    /// Order amount in minor currency units.
    pub amount: i64,

    /// Order description.
    pub description: String,

    /// Order status.
    pub status: OrderStatus,

    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderIndexEntry {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id,
            user_id: order.user_id.clone(),
            amount: order.amount,
            description: order.description.clone(),
            status: order.status,
            created_at: order.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("order-test-user").unwrap()
    }

    #[test]
    fn new_order_is_confirmed() {
        let order = Order::new(user(), 250, "two-fifty".into());
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.amount, 250);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
    }

    #[test]
    fn event_snapshots_the_order() {
        let order = Order::new(user(), 100, "snapshot".into());
        let event = OrderCreated::for_order(&order);
        assert_eq!(event.order.order_id, order.order_id);
        assert_eq!(event.order.amount, 100);
    }

    #[test]
    fn index_entry_projects_all_fields() {
        let order = Order::new(user(), 75, "projection".into());
        let entry = OrderIndexEntry::from(&order);
        assert_eq!(entry.order_id, order.order_id);
        assert_eq!(entry.user_id, order.user_id);
        assert_eq!(entry.amount, 75);
        assert_eq!(entry.description, "projection");
        assert_eq!(entry.created_at, order.created_at);
    }
}
