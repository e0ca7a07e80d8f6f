//! Data models representing stored entities and API payloads.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies exchanged with clients.

/// Bank account model
pub mod account;
/// Catalog product model
pub mod product;
/// Ledger entry model
pub mod transaction;
/// Registered user model
pub mod user;
