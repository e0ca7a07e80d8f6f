//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They validate input, enforce ownership and privilege, and drive the store.

pub mod account_service;
pub mod auth_service;
pub mod catalog_service;
pub mod password;
pub mod retry;
pub mod seed;
pub mod token;
pub mod transaction_service;
