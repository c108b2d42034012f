//! The idempotency pipeline stage.
//!
//! Every mutating handler runs through [`run_idempotent`]: reserve-or-replay
//! before the business closure, commit after. The closure therefore executes
//! at most once per `(user, key)`, and every response — first or replayed —
//! is served from the committed bytes, making replays byte-identical.

use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use payflow_core::{StoredResponse, UserId};
use payflow_store::{Reservation, Store};

use crate::error::ApiError;
use crate::identity::IdemKey;
use crate::state::AppState;

/// Compute the fingerprint of an operation and its canonical parameters.
///
/// A replayed key must present the same fingerprint; reusing a key with
/// different parameters is a client error.
#[must_use]
pub fn fingerprint(operation: &str, params: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    for param in params {
        hasher.update([0u8]);
        hasher.update(param.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Run a mutating operation under idempotency-key protection.
///
/// - `Duplicate` reservations replay the stored response verbatim.
/// - `InFlight` reservations wait with bounded backoff, then fail with a
///   conflict rather than hanging.
/// - On `Fresh`, the closure runs exactly once. Success and definitive
///   client failures are committed and served from the committed bytes;
///   transient failures release the reservation so the client's retry can
///   execute.
pub async fn run_idempotent<F>(
    state: &AppState,
    user_id: &UserId,
    key: &IdemKey,
    fingerprint: String,
    op: F,
) -> Result<Response, ApiError>
where
    F: FnOnce() -> Result<(StatusCode, serde_json::Value), ApiError>,
{
    let mut attempts = 0;
    loop {
        match state
            .store
            .reserve_idempotency(user_id, key.as_str(), &fingerprint)
        {
            Ok(Reservation::Fresh) => break,
            Ok(Reservation::Duplicate(stored)) => {
                tracing::info!(user_id = %user_id, "replaying idempotent request");
                return Ok(render(&stored));
            }
            Ok(Reservation::InFlight) => {
                attempts += 1;
                if attempts >= state.config.idempotency_wait_attempts {
                    return Err(ApiError::Conflict(
                        "a request with this idempotency key is still in progress".into(),
                    ));
                }
                tokio::time::sleep(Duration::from_millis(state.config.idempotency_wait_delay_ms))
                    .await;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let (status, body) = match op() {
        Ok((status, body)) => (status, body),
        Err(err) if err.is_definitive() => err.to_parts(),
        Err(err) => {
            // Transient failure: free the key so the retry re-executes.
            if let Err(release_err) = state.store.release_idempotency(user_id, key.as_str()) {
                tracing::error!(
                    user_id = %user_id,
                    error = %release_err,
                    "failed to release idempotency reservation"
                );
            }
            return Err(err);
        }
    };

    let bytes = serde_json::to_vec(&body)
        .map_err(|e| ApiError::Internal(format!("failed to encode response: {e}")))?;
    let stored = StoredResponse {
        status: status.as_u16(),
        body: bytes,
    };

    state
        .store
        .commit_idempotency(user_id, key.as_str(), &stored)?;

    Ok(render(&stored))
}

/// Render a stored response: exact status and body bytes.
fn render(stored: &StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        stored.body.clone(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let a = fingerprint("topup", &["500"]);
        let b = fingerprint("topup", &["500"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_differs_by_operation_and_params() {
        let topup = fingerprint("topup", &["500"]);
        assert_ne!(topup, fingerprint("topup", &["501"]));
        assert_ne!(topup, fingerprint("create_order", &["500"]));
    }

    #[test]
    fn fingerprint_separates_adjacent_params() {
        // "ab" + "c" must not collide with "a" + "bc".
        assert_ne!(
            fingerprint("op", &["ab", "c"]),
            fingerprint("op", &["a", "bc"])
        );
    }
}
