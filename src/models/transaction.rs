//! Transaction (ledger entry) models and money-movement request/response types.
//!
//! This module defines:
//! - `Transaction`: immutable log entry for every money-moving event
//! - `TransactionType`: deposit, transfer_out, transfer_in or purchase
//! - `NewTransaction`: an entry staged inside a unit of work
//! - Request bodies for deposit, transfer and purchase
//! - Receipts returned once an operation commits

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{account::AccountResponse, product::Product};

/// Kind of money-moving event.
///
/// A transfer is logged as a `TransferOut` entry on the source account and a
/// `TransferIn` entry on the destination, sharing one `group_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    TransferOut,
    TransferIn,
    Purchase,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::TransferOut => "transfer_out",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::Purchase => "purchase",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown transaction type `{0}`")]
pub struct UnknownTransactionType(pub String);

impl FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "transfer_out" => Ok(TransactionType::TransferOut),
            "transfer_in" => Ok(TransactionType::TransferIn),
            "purchase" => Ok(TransactionType::Purchase),
            other => Err(UnknownTransactionType(other.to_string())),
        }
    }
}

/// Represents a transaction record.
///
/// # Database Table
///
/// Maps to the `transactions` table. Rows are insert-only: a trigger rejects
/// UPDATE and DELETE, so the table is the audit trail behind purchase
/// history and account statements.
///
/// # Ordering
///
/// History is returned newest first by `created_at`, ties broken by `seq`
/// (the insertion counter), so the two halves of a transfer keep a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: Uuid,

    /// Insertion order; not part of the public payload
    #[serde(skip_serializing)]
    pub seq: i64,

    /// Owner of `account_id` at the time of the event
    pub user_id: Uuid,

    /// Account whose balance changed
    pub account_id: Uuid,

    /// Other side of a transfer
    pub counterparty_account_id: Option<Uuid>,

    /// Shared by the `transfer_out`/`transfer_in` pair of one transfer
    pub group_id: Option<Uuid>,

    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub unit_price: Option<i64>,

    /// Amount moved in cents; `unit_price * quantity` for purchases
    pub total_amount: i64,

    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
}

/// A log entry staged inside a unit of work, before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub counterparty_account_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub unit_price: Option<i64>,
    pub total_amount: i64,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn deposit(user_id: Uuid, account_id: Uuid, amount: i64, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            account_id,
            counterparty_account_id: None,
            group_id: None,
            product_id: None,
            quantity: None,
            unit_price: None,
            total_amount: amount,
            transaction_type: TransactionType::Deposit,
            created_at: at,
        }
    }

    /// Both halves of a transfer: the debit on `from` and the credit on `to`.
    pub fn transfer_pair(
        from: (Uuid, Uuid),
        to: (Uuid, Uuid),
        amount: i64,
        group_id: Uuid,
        at: DateTime<Utc>,
    ) -> (Self, Self) {
        let (from_user, from_account) = from;
        let (to_user, to_account) = to;

        let out = Self {
            user_id: from_user,
            account_id: from_account,
            counterparty_account_id: Some(to_account),
            group_id: Some(group_id),
            product_id: None,
            quantity: None,
            unit_price: None,
            total_amount: amount,
            transaction_type: TransactionType::TransferOut,
            created_at: at,
        };
        let credit = Self {
            user_id: to_user,
            account_id: to_account,
            counterparty_account_id: Some(from_account),
            transaction_type: TransactionType::TransferIn,
            ..out.clone()
        };

        (out, credit)
    }

    pub fn purchase(
        user_id: Uuid,
        account_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        unit_price: i64,
        total_amount: i64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            account_id,
            counterparty_account_id: None,
            group_id: None,
            product_id: Some(product_id),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            total_amount,
            transaction_type: TransactionType::Purchase,
            created_at: at,
        }
    }

    /// Materialise the entry once storage has assigned its id and sequence.
    pub fn into_transaction(self, id: Uuid, seq: i64) -> Transaction {
        Transaction {
            id,
            seq,
            user_id: self.user_id,
            account_id: self.account_id,
            counterparty_account_id: self.counterparty_account_id,
            group_id: self.group_id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_amount: self.total_amount,
            transaction_type: self.transaction_type,
            created_at: self.created_at,
        }
    }
}

/// Request to deposit money into one of the caller's accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount": 5000
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account_id: Uuid,

    /// Amount to add in cents
    pub amount: i64,
}

/// Request to transfer money between accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "from_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount": 3000
/// }
/// ```
///
/// # Atomicity Guarantee
///
/// BOTH accounts are updated in the same unit of work.
/// If the debit fails, the credit doesn't happen, and vice versa.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Account to transfer from (will decrease); must belong to the caller
    pub from_account_id: Uuid,

    /// Account to transfer to (will increase)
    pub to_account_id: Uuid,

    /// Amount to transfer in cents
    pub amount: i64,
}

/// Request to buy a product with one of the caller's accounts.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub account_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Outcome of a committed deposit.
#[derive(Debug, Serialize)]
pub struct DepositReceipt {
    pub message: &'static str,
    pub transaction: Transaction,
    pub account: AccountResponse,
}

/// Outcome of a committed transfer.
///
/// Only the source account is echoed back; the destination may belong to
/// another user.
#[derive(Debug, Serialize)]
pub struct TransferReceipt {
    pub message: &'static str,
    pub transfer_out: Transaction,
    pub transfer_in: Transaction,
    pub from_account: AccountResponse,
}

/// Outcome of a committed purchase.
#[derive(Debug, Serialize)]
pub struct PurchaseReceipt {
    pub message: &'static str,
    pub transaction: Transaction,
    pub account: AccountResponse,
    pub product: Product,
}
