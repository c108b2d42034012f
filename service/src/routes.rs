//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, health, orders};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts (`X-User-Id`; mutations also need `Idempotency-Key`)
/// - `POST /payments/account` - Create the caller's account
/// - `POST /payments/account/topup` - Add funds
/// - `GET /payments/account/balance` - Strongly consistent balance read
///
/// ## Orders (`X-User-Id`; mutations also need `Idempotency-Key`)
/// - `POST /orders` - Create an order (atomic ledger debit)
/// - `GET /orders/{order_id}` - Get one order (primary records)
/// - `GET /orders` - List orders (eventually consistent read model)
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Accounts
        .route("/payments/account", post(accounts::create_account))
        .route("/payments/account/topup", post(accounts::topup))
        .route("/payments/account/balance", get(accounts::get_balance))
        // Orders
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/:order_id", get(orders::get_order))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
