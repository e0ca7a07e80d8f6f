//! Registration, login and profile lookup.
//!
//! # Process (login)
//!
//! 1. Normalise the email and find the user
//! 2. Verify the password against the stored salted hash
//! 3. Record `last_login`
//! 4. Issue a signed bearer token carrying the user id and role
//!
//! An unknown email and a wrong password produce the same
//! `InvalidCredentials` error so the endpoint cannot be used to discover which
//! emails are registered.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::user::{LoginRequest, LoginResponse, NewUser, RegisterRequest, Role, UserResponse},
    services::{
        password::{hash_password, verify_password},
        token::TokenSigner,
    },
    store::DynStore,
};

pub const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Clone)]
pub struct AuthService {
    store: DynStore,
    tokens: TokenSigner,
}

impl AuthService {
    pub fn new(store: DynStore, tokens: TokenSigner) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &TokenSigner {
        &self.tokens
    }

    /// Create a user with the `user` role.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: a field is missing, the email is malformed or the
    ///   password is shorter than 6 characters
    /// - `UserAlreadyExists`: username or email is taken
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AppError> {
        let username = request.username.trim().to_string();
        let email = normalize_email(&request.email);
        let full_name = request.full_name.trim().to_string();

        if username.is_empty()
            || email.is_empty()
            || request.password.is_empty()
            || full_name.is_empty()
        {
            return Err(AppError::InvalidRequest(
                "All fields are required".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(AppError::InvalidRequest("Invalid email format".to_string()));
        }
        if request.password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(AppError::InvalidRequest(format!(
                "Password must be at least {PASSWORD_MIN_CHARS} characters"
            )));
        }

        self.create_user(username, email, &request.password, full_name, Role::User)
            .await
    }

    /// Insert a user with an explicit role. Used by registration and the
    /// admin bootstrap.
    pub(crate) async fn create_user(
        &self,
        username: String,
        email: String,
        password: &str,
        full_name: String,
        role: Role,
    ) -> Result<UserResponse, AppError> {
        let user = self
            .store
            .create_user(NewUser {
                username,
                email,
                password_hash: hash_password(password),
                full_name,
                role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");

        Ok(user.into())
    }

    /// Exchange email and password for a bearer token.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: email or password missing
    /// - `InvalidCredentials`: unknown email or wrong password
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AppError::InvalidRequest(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, "failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        self.store.record_login(user.id, Utc::now()).await?;
        let token = self.tokens.issue(user.id, user.role)?;

        Ok(LoginResponse {
            token,
            message: "login successful".to_string(),
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        self.store
            .find_user(user_id)
            .await?
            .map(Into::into)
            .ok_or(AppError::UserNotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<UserResponse>, AppError> {
        let users = self.store.list_users().await?;
        Ok(users.into_iter().map(Into::into).collect())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `local@domain.tld` with a conventional character set and an alphabetic
/// top-level domain of at least two letters.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".-".contains(c));
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());

    local_ok && host_ok && tld_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alice@example.com", true)]
    #[case("a.b+shop@mail.example.co", true)]
    #[case("alice@localhost", false)]
    #[case("alice@@example.com", false)]
    #[case("@example.com", false)]
    #[case("alice@example.c", false)]
    #[case("ali ce@example.com", false)]
    fn email_shapes(#[case] email: &str, #[case] valid: bool) {
        assert_eq!(is_valid_email(email), valid, "{email}");
    }

    #[test]
    fn emails_are_compared_case_insensitively() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
