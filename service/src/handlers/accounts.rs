//! Account creation, top-up, and balance handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use payflow_core::Account;
use payflow_store::{Store, StoreError};

use crate::error::ApiError;
use crate::idempotency::{fingerprint, run_idempotent};
use crate::identity::{IdemKey, UserIdentity};
use crate::state::AppState;

/// Account state response, shared by creation, top-up, and balance reads.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// The account's user id.
    pub user_id: String,
    /// Current balance in minor currency units.
    pub balance: i64,
}

/// Create an account for the calling user.
///
/// Replays of the same idempotency key return the original `201`; a second
/// creation under a fresh key is a conflict.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    identity: UserIdentity,
    key: IdemKey,
) -> Result<Response, ApiError> {
    let fp = fingerprint("create_account", &[]);

    run_idempotent(&state, &identity.user_id, &key, fp, || {
        let account = Account::new(identity.user_id.clone());
        match state.store.create_account(&account) {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => {
                return Err(ApiError::Conflict("account already exists".into()));
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(user_id = %identity.user_id, "account created");

        let body = serde_json::to_value(AccountResponse {
            user_id: identity.user_id.to_string(),
            balance: account.balance,
        })?;
        Ok((StatusCode::CREATED, body))
    })
    .await
}

/// Top-up request body.
#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    /// Amount to add, in minor currency units. Must be positive.
    pub amount: i64,
}

/// Add funds to the calling user's account.
pub async fn topup(
    State(state): State<Arc<AppState>>,
    identity: UserIdentity,
    key: IdemKey,
    Json(body): Json<TopUpRequest>,
) -> Result<Response, ApiError> {
    if body.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be > 0".into()));
    }

    let fp = fingerprint("topup", &[&body.amount.to_string()]);

    run_idempotent(&state, &identity.user_id, &key, fp, || {
        let balance = match state.store.deposit(&identity.user_id, body.amount) {
            Ok(balance) => balance,
            Err(StoreError::NotFound) => {
                return Err(ApiError::NotFound("account not found".into()));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            user_id = %identity.user_id,
            amount = %body.amount,
            new_balance = %balance,
            "account topped up"
        );

        let response = serde_json::to_value(AccountResponse {
            user_id: identity.user_id.to_string(),
            balance,
        })?;
        Ok((StatusCode::OK, response))
    })
    .await
}

/// Get the calling user's balance.
///
/// Strongly consistent: reads the primary account record, so every
/// committed top-up and debit is visible.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    identity: UserIdentity,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .store
        .get_account(&identity.user_id)?
        .ok_or_else(|| ApiError::NotFound("account not found".into()))?;

    Ok(Json(AccountResponse {
        user_id: account.user_id.to_string(),
        balance: account.balance,
    }))
}
