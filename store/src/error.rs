//! Error types for payflow storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Account already exists for this user.
    #[error("already exists")]
    AlreadyExists,

    /// Insufficient funds for a debit.
    #[error("insufficient funds: balance={balance}, required={required}")]
    InsufficientFunds {
        /// Current balance in minor units.
        balance: i64,
        /// Required amount in minor units.
        required: i64,
    },

    /// An idempotency key was replayed with a different fingerprint.
    #[error("idempotency key reused with different parameters")]
    IdempotencyMismatch,

    /// Commit or release attempted without a reserved key.
    #[error("no idempotency reservation for this key")]
    NoReservation,
}
