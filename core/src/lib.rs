//! Core types for the payflow ledger and order service.
//!
//! This crate provides the foundational types shared by the storage layer
//! and the HTTP service:
//!
//! - **Identifiers**: `UserId`, `OrderId`, `EventId`
//! - **Ledger**: `Account`
//! - **Orders**: `Order`, `OrderStatus`, `OrderIndexEntry`, `OrderCreated`
//! - **Idempotency**: `IdempotencyRecord`, `StoredResponse`
//!
//! # Amounts
//!
//! All monetary amounts are integers in minor currency units, stored as
//! `i64`. Account balances never go negative: every debit is checked and
//! applied under the owning account's lock in the storage layer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod idempotency;
pub mod ids;
pub mod order;

pub use account::Account;
pub use idempotency::{IdempotencyRecord, RecordState, StoredResponse};
pub use ids::{EventId, IdError, OrderId, UserId};
pub use order::{Order, OrderCreated, OrderIndexEntry, OrderStatus};
