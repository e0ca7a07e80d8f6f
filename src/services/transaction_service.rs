//! Transaction service - Core business logic for money movement.
//!
//! This service handles:
//! - Deposits, transfers and purchases as atomic units of work
//! - Ownership checks against the locked account rows
//! - Balance and stock validation at commit time, never from a stale read
//! - Bounded retries of transient lock/serialization failures
//!
//! # Atomicity Guarantees
//!
//! Every operation opens one [`UnitOfWork`](crate::store::UnitOfWork) over
//! all the rows it touches, so balance changes, stock changes and log entries
//! commit together or not at all. An early return drops the unit, which
//! rolls it back.
//!
//! # Lock Order
//!
//! Rows are locked through a [`LockSet`], which always acquires accounts by
//! id and then products by id. Two transfers over the same pair of accounts
//! in opposite directions therefore queue instead of deadlocking.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::transaction::{
        DepositReceipt, NewTransaction, PurchaseReceipt, Transaction, TransferReceipt,
    },
    services::retry::RetryPolicy,
    store::{DynStore, LockSet},
};

/// Deposit, transfer and purchase engine.
#[derive(Clone)]
pub struct TransactionService {
    store: DynStore,
    retry: RetryPolicy,
    allow_same_owner_transfers: bool,
}

impl TransactionService {
    pub fn new(store: DynStore, retry: RetryPolicy, allow_same_owner_transfers: bool) -> Self {
        Self {
            store,
            retry,
            allow_same_owner_transfers,
        }
    }

    /// Execute a deposit (add money to one of the caller's accounts).
    ///
    /// # Process
    ///
    /// 1. Validate the amount
    /// 2. Lock the account
    /// 3. Check the caller owns it
    /// 4. Credit the balance and append a `deposit` entry
    /// 5. Commit (or roll back on error)
    ///
    /// # Errors
    ///
    /// - `InvalidAmount`: amount is zero or negative
    /// - `AccountNotFound`: account doesn't exist
    /// - `Forbidden`: account belongs to another user
    /// - `Conflict`: the account stayed locked through every retry
    pub async fn execute_deposit(
        &self,
        actor: Uuid,
        account_id: Uuid,
        amount: i64,
    ) -> Result<DepositReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }

        self.retry.run("deposit", move || self.deposit_once(actor, account_id, amount))
            .await
    }

    async fn deposit_once(
        &self,
        actor: Uuid,
        account_id: Uuid,
        amount: i64,
    ) -> Result<DepositReceipt, AppError> {
        let mut unit = self.store.begin(&LockSet::new().account(account_id)).await?;

        let owner = unit
            .account(account_id)
            .map(|a| a.user_id)
            .ok_or(AppError::AccountNotFound)?;
        if owner != actor {
            return Err(AppError::Forbidden);
        }

        let account = unit.adjust_balance(account_id, amount, 0).await?;
        let transaction = unit
            .append(NewTransaction::deposit(
                owner,
                account_id,
                amount,
                Utc::now(),
            ))
            .await?;
        unit.commit().await?;

        info!(
            operation = "deposit",
            %account_id,
            amount,
            balance = account.balance,
            "deposit committed"
        );

        Ok(DepositReceipt {
            message: "Deposit successful",
            transaction,
            account: account.into(),
        })
    }

    /// Execute a transfer (move money between two accounts).
    ///
    /// # Process
    ///
    /// 1. Validate the amount and that the accounts differ
    /// 2. Lock both accounts in id order
    /// 3. Check the caller owns the source account
    /// 4. Debit the source (fails without change if funds are short)
    /// 5. Credit the destination
    /// 6. Append the linked `transfer_out`/`transfer_in` pair
    /// 7. Commit both balances and both entries together
    ///
    /// # Errors
    ///
    /// - `InvalidAmount`: amount is zero or negative
    /// - `InvalidRequest`: same account on both sides, or a same-owner
    ///   transfer while those are disabled
    /// - `AccountNotFound`: either account doesn't exist
    /// - `Forbidden`: caller does not own the source account
    /// - `InsufficientFunds`: source balance is below `amount`
    /// - `Conflict`: the accounts stayed locked through every retry
    pub async fn execute_transfer(
        &self,
        actor: Uuid,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: i64,
    ) -> Result<TransferReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }
        if from_account_id == to_account_id {
            return Err(AppError::InvalidRequest(
                "Cannot transfer to the same account".to_string(),
            ));
        }

        self.retry.run("transfer", move || {
            self.transfer_once(actor, from_account_id, to_account_id, amount)
        })
        .await
    }

    async fn transfer_once(
        &self,
        actor: Uuid,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: i64,
    ) -> Result<TransferReceipt, AppError> {
        let locks = LockSet::new()
            .account(from_account_id)
            .account(to_account_id);
        let mut unit = self.store.begin(&locks).await?;

        let from_owner = unit
            .account(from_account_id)
            .map(|a| a.user_id)
            .ok_or(AppError::AccountNotFound)?;
        if from_owner != actor {
            return Err(AppError::Forbidden);
        }
        let to_owner = unit
            .account(to_account_id)
            .map(|a| a.user_id)
            .ok_or(AppError::AccountNotFound)?;
        if to_owner == from_owner && !self.allow_same_owner_transfers {
            return Err(AppError::InvalidRequest(
                "Transfers between your own accounts are not allowed".to_string(),
            ));
        }

        let from_account = unit.adjust_balance(from_account_id, -amount, 0).await?;
        unit.adjust_balance(to_account_id, amount, 0).await?;

        let (debit, credit) = NewTransaction::transfer_pair(
            (from_owner, from_account_id),
            (to_owner, to_account_id),
            amount,
            Uuid::new_v4(),
            Utc::now(),
        );
        let transfer_out = unit.append(debit).await?;
        let transfer_in = unit.append(credit).await?;
        unit.commit().await?;

        info!(
            operation = "transfer",
            from_account_id = %from_account_id,
            to_account_id = %to_account_id,
            amount,
            "transfer committed"
        );

        Ok(TransferReceipt {
            message: "Transfer successful",
            transfer_out,
            transfer_in,
            from_account: from_account.into(),
        })
    }

    /// Execute a purchase (buy `quantity` units of a product).
    ///
    /// # Process
    ///
    /// 1. Validate the quantity
    /// 2. Lock the account, then the product
    /// 3. Check the caller owns the account
    /// 4. Compute `total = price * quantity` from the locked product row
    /// 5. Decrement stock, then debit the account
    /// 6. Append a `purchase` entry and commit
    ///
    /// Stock and balance are both checked against the locked rows, so two
    /// concurrent purchases can never oversell or overdraw.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity`: quantity is zero or negative, or the total overflows
    /// - `AccountNotFound` / `ProductNotFound`: referenced row doesn't exist
    /// - `Forbidden`: caller does not own the account
    /// - `OutOfStock`: fewer than `quantity` units remain
    /// - `InsufficientFunds`: balance is below the total
    /// - `Conflict`: the rows stayed locked through every retry
    pub async fn execute_purchase(
        &self,
        actor: Uuid,
        account_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<PurchaseReceipt, AppError> {
        if quantity <= 0 {
            return Err(AppError::InvalidQuantity);
        }

        self.retry.run("purchase", move || {
            self.purchase_once(actor, account_id, product_id, quantity)
        })
        .await
    }

    async fn purchase_once(
        &self,
        actor: Uuid,
        account_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<PurchaseReceipt, AppError> {
        let locks = LockSet::new().account(account_id).product(product_id);
        let mut unit = self.store.begin(&locks).await?;

        let owner = unit
            .account(account_id)
            .map(|a| a.user_id)
            .ok_or(AppError::AccountNotFound)?;
        if owner != actor {
            return Err(AppError::Forbidden);
        }
        let unit_price = unit
            .product(product_id)
            .map(|p| p.price)
            .ok_or(AppError::ProductNotFound)?;
        let total = unit_price
            .checked_mul(i64::from(quantity))
            .ok_or(AppError::InvalidQuantity)?;

        let product = unit.decrement_stock(product_id, quantity, 0).await?;
        let account = unit.adjust_balance(account_id, -total, 0).await?;

        let transaction = unit
            .append(NewTransaction::purchase(
                owner,
                account_id,
                product_id,
                quantity,
                unit_price,
                total,
                Utc::now(),
            ))
            .await?;
        unit.commit().await?;

        info!(
            operation = "purchase",
            %account_id,
            %product_id,
            quantity,
            total,
            remaining_stock = product.stock,
            "purchase committed"
        );

        Ok(PurchaseReceipt {
            message: "Purchase successful",
            transaction,
            account: account.into(),
            product,
        })
    }

    /// Every log entry on the user's accounts, newest first.
    pub async fn purchase_history(&self, user_id: Uuid) -> Result<Vec<Transaction>, AppError> {
        self.store.list_transactions_by_user(user_id).await
    }

    /// Log entries of one of the caller's accounts, newest first.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: account doesn't exist
    /// - `Forbidden`: account belongs to another user
    pub async fn account_statement(
        &self,
        actor: Uuid,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;
        if account.user_id != actor {
            return Err(AppError::Forbidden);
        }

        self.store.list_transactions_by_account(account_id).await
    }
}
