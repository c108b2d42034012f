//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by user id.
    pub const ACCOUNTS: &str = "accounts";

    /// Primary order records, keyed by `order_id` (ULID).
    pub const ORDERS: &str = "orders";

    /// Read model: order projections keyed by `user_id || 0x00 || order_id`.
    ///
    /// Built asynchronously from outbox events; may lag `orders`.
    pub const ORDERS_BY_USER: &str = "orders_by_user";

    /// Pending order-created events, keyed by `event_id` (ULID).
    ///
    /// Rows are removed only after the index entry is applied, giving
    /// at-least-once delivery to the index consumer.
    pub const OUTBOX: &str = "outbox";

    /// Idempotency records, keyed by `user_id || 0x00 || idempotency_key`.
    pub const IDEMPOTENCY: &str = "idempotency";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ORDERS,
        cf::ORDERS_BY_USER,
        cf::OUTBOX,
        cf::IDEMPOTENCY,
    ]
}
