//! Storage layer: users, the account ledger, the product catalog and the
//! transaction log.
//!
//! Reads and simple inserts go straight through [`Store`]. Anything that
//! changes a balance or a stock level runs inside a [`UnitOfWork`], which:
//!
//! 1. Locks every account and product it will touch, in one global order
//!    (accounts by id, then products by id), so two units can never wait on
//!    each other in a cycle
//! 2. Stages balance/stock changes and log entries against the locked rows
//! 3. Makes all of them durable together on `commit`
//!
//! Dropping a unit without committing discards everything it staged. That is
//! also what happens when a request is cancelled mid-operation.
//!
//! Lock acquisition is bounded by a timeout and surfaces as
//! [`AppError::Transient`], which callers may retry.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::Account,
        product::{Product, ProductRequest},
        transaction::{NewTransaction, Transaction},
        user::{NewUser, User},
    },
};

/// In-process store with per-row async locks
pub mod memory;
/// PostgreSQL store with row-level locks
pub mod postgres;

/// Shared handle to whichever backend is configured.
pub type DynStore = Arc<dyn Store>;

/// The rows a unit of work will lock, kept sorted so acquisition order is fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSet {
    accounts: BTreeSet<Uuid>,
    products: BTreeSet<Uuid>,
}

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, id: Uuid) -> Self {
        self.accounts.insert(id);
        self
    }

    pub fn product(mut self, id: Uuid) -> Self {
        self.products.insert(id);
        self
    }

    /// Account ids in lock order.
    pub fn accounts(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.accounts.iter().copied()
    }

    /// Product ids in lock order.
    pub fn products(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.products.iter().copied()
    }

    pub fn has_account(&self, id: Uuid) -> bool {
        self.accounts.contains(&id)
    }

    pub fn has_product(&self, id: Uuid) -> bool {
        self.products.contains(&id)
    }
}

/// Durable record of users, accounts, products and transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), AppError>;

    /// Insert a user. Fails with `UserAlreadyExists` on a duplicate username or email.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Open a zero-balance account. Fails with `UserNotFound` for an unknown owner.
    async fn create_account(&self, user_id: Uuid, account_name: &str)
    -> Result<Account, AppError>;

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    /// Accounts of one user, newest first.
    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, AppError>;

    async fn create_product(&self, product: ProductRequest) -> Result<Product, AppError>;

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError>;

    async fn list_products(&self) -> Result<Vec<Product>, AppError>;

    /// Log entries for every account of `user_id`, newest first.
    async fn list_transactions_by_user(&self, user_id: Uuid)
    -> Result<Vec<Transaction>, AppError>;

    /// Log entries of one account, newest first.
    async fn list_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError>;

    /// Lock the rows named in `locks` and open an atomic unit over them.
    ///
    /// Ids that do not exist are simply absent from the unit's snapshot.
    async fn begin(&self, locks: &LockSet) -> Result<Box<dyn UnitOfWork>, AppError>;
}

/// An atomic, serializable read-modify-write over a locked set of rows.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Locked snapshot of an account, including changes staged so far.
    fn account(&self, id: Uuid) -> Option<&Account>;

    /// Locked snapshot of a product, including changes staged so far.
    fn product(&self, id: Uuid) -> Option<&Product>;

    /// Add `delta` (negative for a debit) to an account balance.
    ///
    /// Fails with `InsufficientFunds`, leaving the balance untouched, if the
    /// result would fall below `min_balance`.
    async fn adjust_balance(
        &mut self,
        account_id: Uuid,
        delta: i64,
        min_balance: i64,
    ) -> Result<Account, AppError>;

    /// Take `quantity` units out of stock.
    ///
    /// Fails with `OutOfStock`, leaving stock untouched, if the remainder
    /// would fall below `min_stock`.
    async fn decrement_stock(
        &mut self,
        product_id: Uuid,
        quantity: i32,
        min_stock: i32,
    ) -> Result<Product, AppError>;

    /// Replace a product's display fields, price and stock.
    async fn replace_product(
        &mut self,
        product_id: Uuid,
        changes: ProductRequest,
    ) -> Result<Product, AppError>;

    /// Stage a log entry; it becomes visible only on commit.
    async fn append(&mut self, entry: NewTransaction) -> Result<Transaction, AppError>;

    /// Make every staged change durable and release the locks.
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

/// Error for a unit asked to touch a row it never locked.
pub(crate) fn not_locked(kind: &str, id: Uuid) -> AppError {
    AppError::Storage(format!("{kind} {id} is not part of this unit of work"))
}
