//! User directory endpoints.

use axum::{Extension, extract::State};

use crate::{
    app::AppState, error::AppError, extract::Json, middleware::auth::AuthContext,
    models::user::UserResponse,
};

/// The caller's own user record.
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.auth.profile(auth.user_id).await?;
    Ok(Json(user))
}

/// All users, oldest first; used to find transfer recipients.
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.auth.list_users().await?;
    Ok(Json(users))
}
