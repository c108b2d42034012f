//! Account types for payflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A ledger account for a user.
///
/// The balance only changes through the storage layer's atomic operations;
/// it never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The externally supplied user id.
    pub user_id: UserId,

    /// Current balance in minor currency units.
    pub balance: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the account can cover a debit of `amount`.
    #[must_use]
    pub fn has_sufficient_funds(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}
