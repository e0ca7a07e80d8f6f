//! In-process implementation of the store.
//!
//! Each account and product is its own row behind an `Arc<tokio::sync::Mutex>`,
//! indexed by a `DashMap`, which gives the same row-level locking shape as
//! the PostgreSQL backend: units touching disjoint rows run in parallel, units
//! touching a shared row queue on its mutex.
//!
//! A unit works on staged copies of its locked rows. On commit it takes the
//! log's write lock and then, without yielding, writes every staged row back
//! and appends its entries.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::Account,
        product::{Product, ProductRequest},
        transaction::{NewTransaction, Transaction},
        user::{NewUser, User},
    },
    store::{LockSet, Store, UnitOfWork, not_locked},
};

type Row<T> = Arc<Mutex<T>>;

#[derive(Debug)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    accounts: DashMap<Uuid, Row<Account>>,
    products: DashMap<Uuid, Row<Product>>,
    log: Arc<RwLock<Vec<Transaction>>>,
    seq: Arc<AtomicI64>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            accounts: DashMap::new(),
            products: DashMap::new(),
            log: Arc::new(RwLock::new(Vec::new())),
            seq: Arc::new(AtomicI64::new(0)),
            lock_timeout,
        }
    }

    // Clone the Arc out so no DashMap shard guard is held across an await
    fn account_row(&self, id: Uuid) -> Option<Row<Account>> {
        self.accounts.get(&id).map(|r| Arc::clone(r.value()))
    }

    fn product_row(&self, id: Uuid) -> Option<Row<Product>> {
        self.products.get(&id).map(|r| Arc::clone(r.value()))
    }

    async fn acquire<T>(&self, row: Row<T>) -> Result<OwnedMutexGuard<T>, AppError> {
        tokio::time::timeout(self.lock_timeout, row.lock_owned())
            .await
            .map_err(|_elapsed| AppError::Transient)
    }

    async fn filter_log(&self, keep: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        let log = self.log.read().await;
        let mut entries: Vec<Transaction> = log.iter().filter(|t| keep(t)).cloned().collect();
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        entries
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AppError::UserAlreadyExists);
        }

        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            created_at: Utc::now(),
            last_login: None,
        };
        users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(users)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(AppError::UserNotFound)?;
        user.last_login = Some(at);
        Ok(())
    }

    async fn create_account(
        &self,
        user_id: Uuid,
        account_name: &str,
    ) -> Result<Account, AppError> {
        if !self.users.read().await.contains_key(&user_id) {
            return Err(AppError::UserNotFound);
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            user_id,
            account_name: account_name.to_string(),
            balance: 0,
            created_at: now,
            updated_at: now,
        };
        self.accounts
            .insert(account.id, Arc::new(Mutex::new(account.clone())));

        Ok(account)
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        match self.account_row(id) {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, AppError> {
        let rows: Vec<Row<Account>> = self
            .accounts
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();

        let mut accounts = Vec::new();
        for row in rows {
            let account = row.lock().await.clone();
            if account.user_id == user_id {
                accounts.push(account);
            }
        }
        accounts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(accounts)
    }

    async fn create_product(&self, product: ProductRequest) -> Result<Product, AppError> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            created_at: now,
            updated_at: now,
        };
        self.products
            .insert(product.id, Arc::new(Mutex::new(product.clone())));

        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        match self.product_row(id) {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let rows: Vec<Row<Product>> = self
            .products
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            products.push(row.lock().await.clone());
        }
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        Ok(products)
    }

    async fn list_transactions_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self.filter_log(|t| t.user_id == user_id).await)
    }

    async fn list_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self.filter_log(|t| t.account_id == account_id).await)
    }

    async fn begin(&self, locks: &LockSet) -> Result<Box<dyn UnitOfWork>, AppError> {
        // Accounts first, then products, each in id order. Guards taken so far
        // are released if a later acquisition times out.
        let mut accounts = HashMap::new();
        for id in locks.accounts() {
            if let Some(row) = self.account_row(id) {
                accounts.insert(id, Locked::new(self.acquire(row).await?));
            }
        }

        let mut products = HashMap::new();
        for id in locks.products() {
            if let Some(row) = self.product_row(id) {
                products.insert(id, Locked::new(self.acquire(row).await?));
            }
        }

        Ok(Box::new(MemoryUnitOfWork {
            locks: locks.clone(),
            accounts,
            products,
            pending: Vec::new(),
            log: Arc::clone(&self.log),
            seq: Arc::clone(&self.seq),
        }))
    }
}

/// A held row lock plus the working copy that replaces it on commit.
struct Locked<T> {
    guard: OwnedMutexGuard<T>,
    staged: T,
}

impl<T: Clone> Locked<T> {
    fn new(guard: OwnedMutexGuard<T>) -> Self {
        let staged = (*guard).clone();
        Self { guard, staged }
    }

    fn write_back(self) {
        let Locked { mut guard, staged } = self;
        *guard = staged;
    }
}

struct MemoryUnitOfWork {
    locks: LockSet,
    accounts: HashMap<Uuid, Locked<Account>>,
    products: HashMap<Uuid, Locked<Product>>,
    pending: Vec<Transaction>,
    log: Arc<RwLock<Vec<Transaction>>>,
    seq: Arc<AtomicI64>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.get(&id).map(|l| &l.staged)
    }

    fn product(&self, id: Uuid) -> Option<&Product> {
        self.products.get(&id).map(|l| &l.staged)
    }

    async fn adjust_balance(
        &mut self,
        account_id: Uuid,
        delta: i64,
        min_balance: i64,
    ) -> Result<Account, AppError> {
        if !self.locks.has_account(account_id) {
            return Err(not_locked("account", account_id));
        }
        let row = self
            .accounts
            .get_mut(&account_id)
            .ok_or(AppError::AccountNotFound)?;

        let next = row
            .staged
            .balance
            .checked_add(delta)
            .ok_or(AppError::InvalidAmount)?;
        if next < min_balance {
            return Err(AppError::InsufficientFunds);
        }

        row.staged.balance = next;
        row.staged.updated_at = Utc::now();
        Ok(row.staged.clone())
    }

    async fn decrement_stock(
        &mut self,
        product_id: Uuid,
        quantity: i32,
        min_stock: i32,
    ) -> Result<Product, AppError> {
        if !self.locks.has_product(product_id) {
            return Err(not_locked("product", product_id));
        }
        let row = self
            .products
            .get_mut(&product_id)
            .ok_or(AppError::ProductNotFound)?;

        let remaining = row
            .staged
            .stock
            .checked_sub(quantity)
            .filter(|left| *left >= min_stock)
            .ok_or(AppError::OutOfStock)?;

        row.staged.stock = remaining;
        row.staged.updated_at = Utc::now();
        Ok(row.staged.clone())
    }

    async fn replace_product(
        &mut self,
        product_id: Uuid,
        changes: ProductRequest,
    ) -> Result<Product, AppError> {
        if !self.locks.has_product(product_id) {
            return Err(not_locked("product", product_id));
        }
        let row = self
            .products
            .get_mut(&product_id)
            .ok_or(AppError::ProductNotFound)?;

        row.staged.name = changes.name;
        row.staged.description = changes.description;
        row.staged.price = changes.price;
        row.staged.stock = changes.stock;
        row.staged.updated_at = Utc::now();
        Ok(row.staged.clone())
    }

    async fn append(&mut self, entry: NewTransaction) -> Result<Transaction, AppError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let transaction = entry.into_transaction(Uuid::new_v4(), seq);
        self.pending.push(transaction.clone());
        Ok(transaction)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryUnitOfWork {
            accounts,
            products,
            pending,
            log,
            ..
        } = *self;

        let mut entries = log.write().await;

        // Nothing below yields: a cancelled request applies all of this or none of it
        accounts.into_values().for_each(Locked::write_back);
        products.into_values().for_each(Locked::write_back);
        entries.extend(pending);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    async fn seeded() -> (MemoryStore, Account) {
        let store = MemoryStore::new(Duration::from_millis(50));
        let user = store
            .create_user(NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: String::new(),
                full_name: "Alice".into(),
                role: Role::User,
            })
            .await
            .unwrap();
        let account = store.create_account(user.id, "Main").await.unwrap();
        (store, account)
    }

    #[tokio::test]
    async fn dropped_unit_leaves_no_trace() {
        let (store, account) = seeded().await;

        {
            let mut unit = store
                .begin(&LockSet::new().account(account.id))
                .await
                .unwrap();
            unit.adjust_balance(account.id, 500, 0).await.unwrap();
            unit.append(NewTransaction::deposit(
                account.user_id,
                account.id,
                500,
                Utc::now(),
            ))
            .await
            .unwrap();
        }

        let after = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(after.balance, 0);
        assert!(
            store
                .list_transactions_by_account(account.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn debit_below_minimum_is_rejected_without_change() {
        let (store, account) = seeded().await;
        let mut unit = store
            .begin(&LockSet::new().account(account.id))
            .await
            .unwrap();

        unit.adjust_balance(account.id, 100, 0).await.unwrap();
        let err = unit.adjust_balance(account.id, -101, 0).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientFunds));
        assert_eq!(unit.account(account.id).map(|a| a.balance), Some(100));
    }

    #[tokio::test]
    async fn held_row_times_out_as_transient() {
        let (store, account) = seeded().await;
        let locks = LockSet::new().account(account.id);

        let _held = store.begin(&locks).await.unwrap();
        let err = store.begin(&locks).await.err().unwrap();

        assert!(matches!(err, AppError::Transient));
    }

    #[tokio::test]
    async fn unlocked_rows_cannot_be_touched() {
        let (store, account) = seeded().await;
        let mut unit = store.begin(&LockSet::new()).await.unwrap();

        let err = unit.adjust_balance(account.id, 1, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (store, _) = seeded().await;
        let err = store
            .create_user(NewUser {
                username: "alice2".into(),
                email: "alice@example.com".into(),
                password_hash: String::new(),
                full_name: "Alice Again".into(),
                role: Role::User,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UserAlreadyExists));
    }
}
