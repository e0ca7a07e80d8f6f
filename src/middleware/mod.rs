//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Throttle clients
//! - Short-circuit requests (reject unauthorized or over-limit callers)

/// Bearer token authentication middleware
pub mod auth;
/// Per-client token-bucket rate limiting
pub mod rate_limit;
