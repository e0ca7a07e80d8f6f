//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: Stored entity representing a bank account
//! - `CreateAccountRequest`: Request body for creating accounts
//! - `AccountResponse`: Full account view for the owner
//! - `AccountSummary`: Balance-free view of someone else's account

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Minimum and maximum account name length, in characters.
pub const ACCOUNT_NAME_MIN: usize = 3;
pub const ACCOUNT_NAME_MAX: usize = 50;

/// Represents an account record.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Belongs to one user (via `user_id`); a user may own many accounts
/// - Has a balance stored in cents (to avoid floating-point errors)
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents. For example:
/// - $10.50 is stored as 1050 cents
/// - $100.00 is stored as 10000 cents
///
/// The balance is never negative (database CHECK constraint) and is only
/// changed through `UnitOfWork::adjust_balance`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Human-readable name for this account (3-50 characters)
    pub account_name: String,

    /// Current balance in cents
    pub balance: i64,

    /// Timestamp when account was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of last balance update
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a new account.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_name": "My Savings Account"
/// }
/// ```
///
/// New accounts always start at a zero balance; money arrives via deposit.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub account_name: String,
}

impl CreateAccountRequest {
    /// Trimmed account name, validated for length.
    pub fn validated_name(&self) -> Result<String, AppError> {
        let name = self.account_name.trim();
        let len = name.chars().count();

        if len == 0 {
            return Err(AppError::InvalidRequest(
                "Account name cannot be empty".to_string(),
            ));
        }
        if len < ACCOUNT_NAME_MIN {
            return Err(AppError::InvalidRequest(format!(
                "Account name must be at least {ACCOUNT_NAME_MIN} characters"
            )));
        }
        if len > ACCOUNT_NAME_MAX {
            return Err(AppError::InvalidRequest(format!(
                "Account name cannot exceed {ACCOUNT_NAME_MAX} characters"
            )));
        }

        Ok(name.to_string())
    }
}

/// Response body for the owner's own accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "user_id": "9f0e8400-e29b-41d4-a716-446655440000",
///   "account_name": "My Account",
///   "balance": 100000,
///   "created_at": "2025-12-20T10:00:00Z",
///   "updated_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_name: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            user_id: account.user_id,
            account_name: account.account_name,
            balance: account.balance,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// What other users see when picking a transfer destination.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountSummary {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            user_id: account.user_id,
            account_name: account.account_name,
            created_at: account.created_at,
        }
    }
}
