//! Request identity and idempotency-key extractors.
//!
//! Callers are identified by the `X-User-Id` header. There is no anonymous
//! fallback: every account-scoped route, reads included, rejects requests
//! without it. Mutating routes additionally extract `Idempotency-Key`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use payflow_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Maximum accepted length of an idempotency key, in bytes.
const MAX_IDEMPOTENCY_KEY_LEN: usize = 256;

/// The identified caller, extracted from the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    /// The validated user id.
    pub user_id: UserId,
}

impl FromRequestParts<Arc<AppState>> for UserIdentity {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let header = parts
                .headers
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::BadRequest("X-User-Id header is required".into()))?;

            let user_id = header
                .parse::<UserId>()
                .map_err(|_| ApiError::BadRequest("invalid X-User-Id header".into()))?;

            Ok(UserIdentity { user_id })
        })
    }
}

/// A client-supplied idempotency key, extracted from `Idempotency-Key`.
#[derive(Debug, Clone)]
pub struct IdemKey(pub String);

impl IdemKey {
    /// Return the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<Arc<AppState>> for IdemKey {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let key = parts
                .headers
                .get("idempotency-key")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::BadRequest("Idempotency-Key header is required".into()))?;

            if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(ApiError::BadRequest("Idempotency-Key is too long".into()));
            }

            Ok(IdemKey(key.to_string()))
        })
    }
}
