//! Payflow HTTP API Service.
//!
//! This crate provides the HTTP surface of the payflow backend:
//!
//! - Account creation, top-up, and strongly consistent balance reads
//! - Order creation with an atomic ledger debit
//! - An eventually consistent, paginated per-user order listing
//!
//! # Request identity
//!
//! Callers identify themselves with the `X-User-Id` header; every account-
//! scoped route (reads included) rejects requests without it. Mutating
//! routes additionally require an `Idempotency-Key` header and replay the
//! canonical response when a key is retried.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for axum even when the store is sync

pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod idempotency;
pub mod indexer;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use indexer::OrderIndexer;
pub use routes::create_router;
pub use state::AppState;
