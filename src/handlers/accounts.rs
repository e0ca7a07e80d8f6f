//! Account management HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - POST /accounts - Open a new account for the caller
//! - GET /accounts - List the caller's accounts
//! - GET /accounts/{id} - List the accounts of user `id`

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    extract::{Json, Path},
    middleware::auth::AuthContext,
    models::account::{AccountResponse, CreateAccountRequest},
    services::account_service::AccountListing,
};

/// Create a new account.
///
/// # Endpoint
///
/// `POST /accounts`
///
/// # Request Body
///
/// ```json
/// {
///   "account_name": "My Account"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created account with a zero balance
/// - **Error (400)**: Name is empty, shorter than 3 or longer than 50 characters
/// - **Error (401)**: Missing or invalid token
pub async fn create_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let account = state
        .accounts
        .create_account(auth.user_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// List all accounts of the authenticated user.
///
/// # Ordering
///
/// Accounts are returned in reverse chronological order (newest first).
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let accounts = state.accounts.list_accounts(auth.user_id).await?;
    Ok(Json(accounts))
}

/// List the accounts of any user, e.g. to choose a transfer destination.
///
/// # Endpoint
///
/// `GET /accounts/{id}` where `id` is a user id
///
/// # Response
///
/// - **Success (200 OK)**: Array of accounts; balances are omitted unless
///   `id` is the caller
/// - **Error (404)**: No such user
pub async fn list_accounts_by_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AccountListing>, AppError> {
    let listing = state
        .accounts
        .list_accounts_by_user(auth.user_id, user_id)
        .await?;

    Ok(Json(listing))
}
