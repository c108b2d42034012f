//! `RocksDB` storage layer for the payflow ledger and order service.
//!
//! This crate provides persistent storage for accounts, orders, the
//! per-user order index, the order-created outbox, and idempotency records.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: Primary account records, keyed by user id
//! - `orders`: Primary order records, keyed by `order_id` (ULID)
//! - `orders_by_user`: Denormalized order projections for listing
//! - `outbox`: Order-created events awaiting index application
//! - `idempotency`: Reservation/commit records per `(user, key)`
//!
//! # Consistency
//!
//! All mutations for a single account serialize on a per-account lock;
//! accounts are independent, so unrelated users never contend. Multi-key
//! commits (debit + order + outbox event) go through a single `WriteBatch`,
//! making the order's existence and its debit atomic.
//!
//! # Example
//!
//! ```no_run
//! use payflow_store::{RocksStore, Store};
//! use payflow_core::{Account, UserId};
//!
//! let store = RocksStore::open("/tmp/payflow-db").unwrap();
//!
//! let user_id = UserId::new("user-1").unwrap();
//! store.create_account(&Account::new(user_id.clone())).unwrap();
//! let balance = store.deposit(&user_id, 500).unwrap();
//! assert_eq!(balance, 500);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use payflow_core::{
    Account, EventId, Order, OrderCreated, OrderId, OrderIndexEntry, StoredResponse, UserId,
};

/// Outcome of an idempotency reservation attempt.
#[derive(Debug, Clone)]
pub enum Reservation {
    /// First sighting of the key; a pending record was written and the
    /// caller must execute the operation exactly once.
    Fresh,

    /// The key was already committed; replay the stored response.
    Duplicate(StoredResponse),

    /// A concurrent request holds the pending reservation; wait and retry.
    InFlight,
}

/// The storage trait defining all database operations.
///
/// Abstracts the storage layer so tests and alternative backends can swap
/// in their own implementation.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Create an account. The balance starts at zero.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the user already has an
    /// account.
    fn create_account(&self, account: &Account) -> Result<()>;

    /// Get an account by user id.
    ///
    /// Strongly consistent: reflects every committed deposit and debit at
    /// the moment of the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    /// Atomically add `amount` to the account's balance.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    fn deposit(&self, user_id: &UserId, amount: i64) -> Result<i64>;

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Debit the account and persist the order and its outbox event in one
    /// atomic batch.
    ///
    /// Returns the new balance. No order exists without its debit having
    /// succeeded, and no debit occurs without the order being recorded.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientFunds` if the balance can't cover the
    ///   amount; nothing is written.
    fn debit_and_insert_order(&self, order: &Order, event: &OrderCreated) -> Result<i64>;

    /// Get an order by id from the primary records.
    ///
    /// Ownership is the caller's concern; the row is returned regardless of
    /// user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>>;

    // =========================================================================
    // Order Index Operations
    // =========================================================================

    /// Read up to `limit` pending outbox events, oldest first.
    ///
    /// Events stay in the outbox until [`Store::remove_outbox`]; a consumer
    /// crash between apply and remove redelivers them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn peek_outbox(&self, limit: usize) -> Result<Vec<OrderCreated>>;

    /// Remove a delivered outbox event.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn remove_outbox(&self, event_id: &EventId) -> Result<()>;

    /// Insert the order projection for an event into the per-user index.
    ///
    /// Returns `false` without writing when the order id is already
    /// indexed, making duplicate event delivery harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn apply_index_entry(&self, event: &OrderCreated) -> Result<bool>;

    /// List a user's index entries, newest first.
    ///
    /// Serves the eventually consistent order listing; entries may lag the
    /// primary records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_index_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<OrderIndexEntry>>;

    // =========================================================================
    // Idempotency Operations
    // =========================================================================

    /// Atomically check-or-reserve an idempotency key for a user.
    ///
    /// Exactly one of the concurrent requests carrying the same
    /// `(user, key)` observes [`Reservation::Fresh`]; the rest observe
    /// [`Reservation::InFlight`] until the winner commits, then
    /// [`Reservation::Duplicate`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::IdempotencyMismatch` if the key exists with a
    /// different fingerprint.
    fn reserve_idempotency(
        &self,
        user_id: &UserId,
        key: &str,
        fingerprint: &str,
    ) -> Result<Reservation>;

    /// Commit the canonical response for a reserved key.
    ///
    /// # Errors
    ///
    /// - `StoreError::NoReservation` if the key was never reserved.
    /// - `StoreError::AlreadyExists` if the key is already committed.
    fn commit_idempotency(
        &self,
        user_id: &UserId,
        key: &str,
        response: &StoredResponse,
    ) -> Result<()>;

    /// Drop a pending reservation after a transient failure so the
    /// client's retry can execute.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoReservation` if the key isn't pending.
    fn release_idempotency(&self, user_id: &UserId, key: &str) -> Result<()>;
}
