//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, auth context)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

/// Account management endpoints
pub mod accounts;
/// Registration and login
pub mod auth;
/// Health check endpoint
pub mod health;
/// Product catalog endpoints
pub mod products;
/// Deposit, transfer, purchase and history endpoints
pub mod transactions;
/// Profile and user directory
pub mod users;
