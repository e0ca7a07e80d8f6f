//! PostgreSQL implementation of the store.
//!
//! A unit of work is one database transaction. Rows are locked up front with
//! `SELECT ... ORDER BY id FOR UPDATE`, which acquires the locks in id order,
//! under `SET LOCAL lock_timeout` so a stuck lock turns into a retryable
//! error instead of an indefinite wait. Dropping the sqlx transaction without
//! committing rolls it back.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        account::Account,
        product::{Product, ProductRequest},
        transaction::{NewTransaction, Transaction, TransactionType},
        user::{NewUser, Role, User},
    },
    store::{LockSet, Store, UnitOfWork, not_locked},
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, password_hash, full_name, role, created_at, last_login
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::UserAlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, full_name, role, created_at, last_login
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, full_name, role, created_at, last_login
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, full_name, role, created_at, last_login
            FROM users
            ORDER BY created_at, username
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let updated = sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AppError::UserNotFound);
        }

        Ok(())
    }

    async fn create_account(
        &self,
        user_id: Uuid,
        account_name: &str,
    ) -> Result<Account, AppError> {
        let inserted = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, user_id, account_name, balance)
            VALUES ($1, $2, $3, 0)
            RETURNING id, user_id, account_name, balance, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(account_name)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(account) => Ok(account),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(AppError::UserNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, account_name, balance, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn list_accounts_by_user(&self, user_id: Uuid) -> Result<Vec<Account>, AppError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, account_name, balance, created_at, updated_at
            FROM accounts
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn create_product(&self, product: ProductRequest) -> Result<Product, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, name, description, price, stock)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, price, stock, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, stock, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, stock, created_at, updated_at
            FROM products
            ORDER BY name, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn list_transactions_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, seq, user_id, account_id, counterparty_account_id, group_id,
                   product_id, quantity, unit_price, total_amount, transaction_type, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn list_transactions_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, AppError> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, seq, user_id, account_id, counterparty_account_id, group_id,
                   product_id, quantity, unit_price, total_amount, transaction_type, created_at
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn begin(&self, locks: &LockSet) -> Result<Box<dyn UnitOfWork>, AppError> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters; the value is a plain integer
        let timeout_ms = self.lock_timeout.as_millis().max(1);
        sqlx::query(&format!("SET LOCAL lock_timeout = '{timeout_ms}ms'"))
            .execute(&mut *tx)
            .await?;

        let account_ids: Vec<Uuid> = locks.accounts().collect();
        let mut accounts = HashMap::with_capacity(account_ids.len());
        if !account_ids.is_empty() {
            let rows = sqlx::query_as::<_, Account>(
                r#"
                SELECT id, user_id, account_name, balance, created_at, updated_at
                FROM accounts
                WHERE id = ANY($1)
                ORDER BY id
                FOR UPDATE
                "#,
            )
            .bind(&account_ids)
            .fetch_all(&mut *tx)
            .await?;
            accounts.extend(rows.into_iter().map(|a| (a.id, a)));
        }

        let product_ids: Vec<Uuid> = locks.products().collect();
        let mut products = HashMap::with_capacity(product_ids.len());
        if !product_ids.is_empty() {
            let rows = sqlx::query_as::<_, Product>(
                r#"
                SELECT id, name, description, price, stock, created_at, updated_at
                FROM products
                WHERE id = ANY($1)
                ORDER BY id
                FOR UPDATE
                "#,
            )
            .bind(&product_ids)
            .fetch_all(&mut *tx)
            .await?;
            products.extend(rows.into_iter().map(|p| (p.id, p)));
        }

        Ok(Box::new(PgUnitOfWork {
            tx,
            locks: locks.clone(),
            accounts,
            products,
        }))
    }
}

struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
    locks: LockSet,
    accounts: HashMap<Uuid, Account>,
    products: HashMap<Uuid, Product>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.get(&id)
    }

    fn product(&self, id: Uuid) -> Option<&Product> {
        self.products.get(&id)
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
        let current = self
            .accounts
            .get(&account_id)
            .ok_or(AppError::AccountNotFound)?;
        current
            .balance
            .checked_add(delta)
            .ok_or(AppError::InvalidAmount)?;

        // The row is already locked; the WHERE clause keeps the database authoritative
        let updated = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance = balance + $1,
                updated_at = NOW()
            WHERE id = $2 AND balance + $1 >= $3
            RETURNING id, user_id, account_name, balance, created_at, updated_at
            "#,
        )
        .bind(delta)
        .bind(account_id)
        .bind(min_balance)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::InsufficientFunds)?;

        self.accounts.insert(account_id, updated.clone());
        Ok(updated)
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
        if !self.products.contains_key(&product_id) {
            return Err(AppError::ProductNotFound);
        }

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock = stock - $1,
                updated_at = NOW()
            WHERE id = $2 AND stock - $1 >= $3
            RETURNING id, name, description, price, stock, created_at, updated_at
            "#,
        )
        .bind(quantity)
        .bind(product_id)
        .bind(min_stock)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::OutOfStock)?;

        self.products.insert(product_id, updated.clone());
        Ok(updated)
    }

    async fn replace_product(
        &mut self,
        product_id: Uuid,
        changes: ProductRequest,
    ) -> Result<Product, AppError> {
        if !self.locks.has_product(product_id) {
            return Err(not_locked("product", product_id));
        }
        if !self.products.contains_key(&product_id) {
            return Err(AppError::ProductNotFound);
        }

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $2,
                description = $3,
                price = $4,
                stock = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, price, stock, created_at, updated_at
            "#,
        )
        .bind(product_id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(changes.stock)
        .fetch_one(&mut *self.tx)
        .await?;

        self.products.insert(product_id, updated.clone());
        Ok(updated)
    }

    async fn append(&mut self, entry: NewTransaction) -> Result<Transaction, AppError> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                id,
                user_id,
                account_id,
                counterparty_account_id,
                group_id,
                product_id,
                quantity,
                unit_price,
                total_amount,
                transaction_type,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, seq, user_id, account_id, counterparty_account_id, group_id,
                      product_id, quantity, unit_price, total_amount, transaction_type, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.account_id)
        .bind(entry.counterparty_account_id)
        .bind(entry.group_id)
        .bind(entry.product_id)
        .bind(entry.quantity)
        .bind(entry.unit_price)
        .bind(entry.total_amount)
        .bind(entry.transaction_type.as_str())
        .bind(entry.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(transaction)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }
}

fn decode_error(column: &str, source: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let role: String = row.try_get("role")?;
        let role = role
            .parse::<Role>()
            .map_err(|e| decode_error("role", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            full_name: row.try_get("full_name")?,
            role,
            created_at: row.try_get("created_at")?,
            last_login: row.try_get("last_login")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Transaction {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let kind: String = row.try_get("transaction_type")?;
        let transaction_type = kind
            .parse::<TransactionType>()
            .map_err(|e| decode_error("transaction_type", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            seq: row.try_get("seq")?,
            user_id: row.try_get("user_id")?,
            account_id: row.try_get("account_id")?,
            counterparty_account_id: row.try_get("counterparty_account_id")?,
            group_id: row.try_get("group_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            total_amount: row.try_get("total_amount")?,
            transaction_type,
            created_at: row.try_get("created_at")?,
        })
    }
}
