//! Money movement HTTP handlers.
//!
//! Endpoints:
//! - POST /deposit - Add money to one of the caller's accounts
//! - POST /transfer - Move money from a caller account to any account
//! - POST /purchase - Buy a product with a caller account
//! - GET /purchases - The caller's transaction history, newest first
//! - GET /accounts/{id}/transactions - Statement of one caller account
//!
//! All business logic lives in
//! [`TransactionService`](crate::services::transaction_service::TransactionService);
//! these handlers only extract input and shape the response.

use axum::{
    Extension,
    extract::State,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    extract::{Json, Path},
    middleware::auth::AuthContext,
    models::transaction::{
        DepositReceipt, DepositRequest, PurchaseReceipt, PurchaseRequest, Transaction,
        TransferReceipt, TransferRequest,
    },
};

/// Deposit money.
///
/// # Request Body
///
/// ```json
/// { "account_id": "550e8400-e29b-41d4-a716-446655440000", "amount": 5000 }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: The `deposit` entry and the updated account
/// - **Error (400)**: `invalid_amount`
/// - **Error (403)**: Account belongs to another user
/// - **Error (404)**: Account not found
pub async fn deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<DepositReceipt>, AppError> {
    let receipt = state
        .transactions
        .execute_deposit(auth.user_id, request.account_id, request.amount)
        .await?;

    Ok(Json(receipt))
}

/// Transfer money between accounts.
///
/// # Response
///
/// - **Success (200 OK)**: Both linked entries and the updated source account
/// - **Error (400)**: Invalid amount or same account on both sides
/// - **Error (403)**: Caller does not own the source account
/// - **Error (404)**: Either account not found
/// - **Error (422)**: Insufficient funds
pub async fn transfer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferReceipt>, AppError> {
    let receipt = state
        .transactions
        .execute_transfer(
            auth.user_id,
            request.from_account_id,
            request.to_account_id,
            request.amount,
        )
        .await?;

    Ok(Json(receipt))
}

/// Purchase a product.
///
/// # Response
///
/// - **Success (200 OK)**: The `purchase` entry, the debited account and the product
/// - **Error (400)**: `invalid_quantity`
/// - **Error (403)**: Caller does not own the account
/// - **Error (404)**: Account or product not found
/// - **Error (422)**: `out_of_stock` or `insufficient_funds`
/// - **Error (429)**: Too many purchases from this client
pub async fn purchase(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseReceipt>, AppError> {
    let receipt = state
        .transactions
        .execute_purchase(
            auth.user_id,
            request.account_id,
            request.product_id,
            request.quantity,
        )
        .await?;

    Ok(Json(receipt))
}

/// Every committed entry on the caller's accounts, newest first.
pub async fn purchase_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let history = state.transactions.purchase_history(auth.user_id).await?;
    Ok(Json(history))
}

/// Statement of one of the caller's accounts, newest first.
pub async fn account_statement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let statement = state
        .transactions
        .account_statement(auth.user_id, account_id)
        .await?;

    Ok(Json(statement))
}
