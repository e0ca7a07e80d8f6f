//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the token from the Authorization header
//! 2. Verify its signature and expiry
//! 3. Inject authentication context into the request
//! 4. Reject unauthenticated requests with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{error::AppError, models::user::Role, services::token::TokenSigner};

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    /// Authenticated user; every ownership check compares against this
    pub user_id: Uuid,

    /// Role claimed by the token when it was issued. Admin handlers use it to
    /// turn callers away before touching storage; the catalog service still
    /// checks the stored role, so a demoted admin loses access immediately.
    pub role: Role,
}

impl AuthContext {
    /// Cheap check against the token's role claim. Passing it is necessary
    /// but not sufficient for admin operations.
    pub fn require_admin_claim(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Bearer token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Verify the HMAC signature and `exp` claim
/// 3. If valid: inject `AuthContext` into request, call next handler
/// 4. Otherwise: return 401 Unauthorized error
///
/// # Returns
///
/// - `Ok(Response)` if authenticated successfully (calls next handler)
/// - `Err(AppError::Unauthenticated)` if authentication fails (returns 401)
pub async fn auth_middleware(
    State(tokens): State<TokenSigner>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthenticated)?;

    let claims = tokens.verify(token)?;

    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(AuthContext {
        user_id: claims.user_id,
        role: claims.role,
    });

    Ok(next.run(request).await)
}
