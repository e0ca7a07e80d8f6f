//! Registration and login endpoints. Both are public and rate limited.

use axum::{extract::State, http::StatusCode};

use crate::{
    app::AppState,
    error::AppError,
    extract::Json,
    models::user::{LoginRequest, LoginResponse, RegisterRequest, UserResponse},
};

/// Register a new user.
///
/// # Endpoint
///
/// `POST /auth/register`
///
/// # Response
///
/// - **Success (201 Created)**: The new user (without password hash)
/// - **Error (400)**: Missing field, malformed email or short password
/// - **Error (409)**: Username or email already registered
/// - **Error (429)**: Too many registrations from this client
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in and receive a bearer token.
///
/// # Response (200 OK)
///
/// ```json
/// { "token": "eyJhbGciOi...", "message": "login successful" }
/// ```
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = state.auth.login(request).await?;
    Ok(Json(response))
}
