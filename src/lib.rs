//! Banking and shop backend: accounts, deposits, transfers, product purchases
//! and the transaction log behind them.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Storage**: PostgreSQL with sqlx, or an in-process store for development
//! - **Authentication**: HS256 bearer tokens, salted HMAC-SHA256 passwords
//! - **Format**: JSON requests/responses, money as integer cents

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
