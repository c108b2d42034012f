//! Idempotency records.
//!
//! Every mutating request is keyed by `(user_id, idempotency_key)`. The
//! first time a key is seen a `Pending` record is reserved; once the
//! operation finishes the record is committed with the canonical response,
//! and every replay of the key is served those exact bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The canonical response committed for an idempotency key.
///
/// Replays return these bytes verbatim, so retried clients observe a single
/// logical effect no matter how many times the request is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// HTTP status code of the first response.
    pub status: u16,

    /// Serialized JSON body of the first response.
    pub body: Vec<u8>,
}

/// State of an idempotency record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    /// Reserved; the first request is still executing.
    Pending,

    /// The operation finished; the stored response is canonical.
    Committed(StoredResponse),
}

/// A record of a mutating request, keyed by `(user_id, idempotency_key)`.
///
/// Never mutated after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Hex SHA-256 fingerprint of the operation and its parameters.
    ///
    /// A replayed key must present the same fingerprint; reusing a key with
    /// different parameters is rejected.
    pub fingerprint: String,

    /// Reservation state.
    pub state: RecordState,

    /// When the key was first reserved.
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Reserve a fresh record for a first-seen key.
    #[must_use]
    pub fn reserve(fingerprint: String) -> Self {
        Self {
            fingerprint,
            state: RecordState::Pending,
            created_at: Utc::now(),
        }
    }

    /// Return the committed response, if the record has one.
    #[must_use]
    pub fn response(&self) -> Option<&StoredResponse> {
        match &self.state {
            RecordState::Committed(response) => Some(response),
            RecordState::Pending => None,
        }
    }
}
