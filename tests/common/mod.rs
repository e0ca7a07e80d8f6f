//! Shared fixtures for integration tests.
//!
//! Everything runs against the in-memory store unless a test opts into
//! PostgreSQL explicitly.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use chrono::Duration as TokenTtl;
use shopbank::{
    app::AppState,
    middleware::rate_limit::RateLimits,
    models::{
        account::Account,
        product::{Product, ProductRequest},
        user::{NewUser, Role},
    },
    services::{password::hash_password, token::TokenSigner, retry::RetryPolicy},
    store::{DynStore, memory::MemoryStore},
};
use uuid::Uuid;

pub mod scenarios;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Knobs that differ between test scenarios.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub lock_timeout: Duration,
    pub retry: RetryPolicy,
    pub allow_same_owner_transfers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            allow_same_owner_transfers: true,
        }
    }
}

pub fn memory_state() -> AppState {
    memory_state_with(Settings::default())
}

pub fn memory_state_with(settings: Settings) -> AppState {
    let store: DynStore = Arc::new(MemoryStore::new(settings.lock_timeout));
    state_for(store, settings, RateLimits::unlimited())
}

pub fn state_for(store: DynStore, settings: Settings, limits: RateLimits) -> AppState {
    AppState::new(
        store,
        TokenSigner::new(JWT_SECRET, TokenTtl::hours(1)),
        settings.retry,
        settings.allow_same_owner_transfers,
        limits,
    )
}

/// Insert a user directly; the password is always `password123`.
pub async fn user(store: &DynStore, name: &str, role: Role) -> Uuid {
    // Suffix keeps usernames unique when tests share a database
    let tag = Uuid::new_v4().simple().to_string();
    let username = format!("{name}_{}", &tag[..8]);

    store
        .create_user(NewUser {
            email: format!("{username}@example.com"),
            username,
            password_hash: hash_password("password123"),
            full_name: name.to_string(),
            role,
        })
        .await
        .expect("create user")
        .id
}

/// Open an account for `owner` and deposit `balance` into it.
pub async fn account(state: &AppState, owner: Uuid, balance: i64) -> Account {
    let account = state
        .store
        .create_account(owner, "Checking")
        .await
        .expect("create account");

    if balance > 0 {
        state
            .transactions
            .execute_deposit(owner, account.id, balance)
            .await
            .expect("fund account");
    }

    balance_of(state, account.id).await
}

pub async fn product(store: &DynStore, price: i64, stock: i32) -> Product {
    store
        .create_product(ProductRequest {
            name: format!("Widget {}", Uuid::new_v4().simple()),
            description: "test product".to_string(),
            price,
            stock,
        })
        .await
        .expect("create product")
}

pub async fn balance_of(state: &AppState, account_id: Uuid) -> Account {
    state
        .store
        .get_account(account_id)
        .await
        .expect("read account")
        .expect("account exists")
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> i32 {
    state
        .store
        .get_product(product_id)
        .await
        .expect("read product")
        .expect("product exists")
        .stock
}
