//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and a stable error code.
///
/// # Error Categories
///
/// - **Input Errors**: amounts, quantities or request fields failing a precondition
/// - **Identity Errors**: missing/invalid credentials, lack of ownership or privilege
/// - **Resource Errors**: referenced user, account or product does not exist
/// - **Business Rule Errors**: insufficient funds, out of stock
/// - **Contention Errors**: lock timeouts and serialization failures (safe to retry)
/// - **Storage Errors**: persistence faults, logged and hidden from the client
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Built through the manual `From<sqlx::Error>` impl below, which routes
    /// lock and serialization failures to `Transient` instead.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Non-database storage fault (e.g., a unit of work used outside its lock set).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Lock contention or serialization failure; the identical request may be retried.
    #[error("Storage is busy, please retry")]
    Transient,

    /// Retries were exhausted while the rows stayed contended.
    #[error("The operation conflicted with concurrent activity, please retry")]
    Conflict,

    /// Bearer credential missing, malformed, expired or mis-signed.
    #[error("Authentication required")]
    Unauthenticated,

    /// Email/password pair did not match a user.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Caller does not own the account or lacks the required role.
    #[error("You are not allowed to perform this operation")]
    Forbidden,

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    /// Requested account does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Account not found")]
    AccountNotFound,

    #[error("Product not found")]
    ProductNotFound,

    /// Account has insufficient balance for the requested operation.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Not enough stock available")]
    OutOfStock,

    #[error("Amount must be a positive number of cents")]
    InvalidAmount,

    #[error("Quantity must be a positive whole number")]
    InvalidQuantity,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    #[error("Rate limit exceeded. Try again later.")]
    RateLimited,
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // lock_not_available, deadlock_detected, serialization_failure
            sqlx::Error::Database(db)
                if matches!(db.code().as_deref(), Some("55P03" | "40P01" | "40001")) =>
            {
                AppError::Transient
            }
            sqlx::Error::PoolTimedOut => AppError::Transient,
            _ => AppError::Database(err),
        }
    }
}

// Malformed bodies (bad JSON, wrong types such as a fractional amount, a
// missing content type) and unparsable path ids are all client input errors.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl AppError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Storage(_) => "internal_error",
            AppError::Transient => "transient",
            AppError::Conflict => "conflict",
            AppError::Unauthenticated => "unauthenticated",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Forbidden => "forbidden",
            AppError::UserNotFound => "user_not_found",
            AppError::UserAlreadyExists => "user_already_exists",
            AppError::AccountNotFound => "account_not_found",
            AppError::ProductNotFound => "product_not_found",
            AppError::InsufficientFunds => "insufficient_funds",
            AppError::OutOfStock => "out_of_stock",
            AppError::InvalidAmount => "invalid_amount",
            AppError::InvalidQuantity => "invalid_quantity",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::RateLimited => "rate_limited",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Transient => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Conflict | AppError::UserAlreadyExists => StatusCode::CONFLICT,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::AccountNotFound | AppError::ProductNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::InsufficientFunds | AppError::OutOfStock => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidAmount | AppError::InvalidQuantity | AppError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Storage faults are logged here and answered with a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::Database(_) | AppError::Storage(_) => {
                tracing::error!(error = %self, "storage fault");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_faults_hide_details() {
        let err = AppError::Storage("row 42 exploded".to_string());
        assert_eq!(err.code(), "internal_error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn pool_timeouts_are_transient() {
        assert!(matches!(
            AppError::from(sqlx::Error::PoolTimedOut),
            AppError::Transient
        ));
        assert!(matches!(
            AppError::from(sqlx::Error::RowNotFound),
            AppError::Database(_)
        ));
    }

    #[test]
    fn business_rejections_are_unprocessable() {
        assert_eq!(
            AppError::InsufficientFunds.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::OutOfStock.code(), "out_of_stock");
        assert_eq!(AppError::Conflict.status(), StatusCode::CONFLICT);
    }
}
