//! Account creation and listing.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::account::{AccountResponse, AccountSummary, CreateAccountRequest},
    store::DynStore,
};

/// Accounts of some user, as the caller is allowed to see them.
///
/// Serializes as a plain JSON array either way; only the owner sees balances.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AccountListing {
    Owned(Vec<AccountResponse>),
    Foreign(Vec<AccountSummary>),
}

#[derive(Clone)]
pub struct AccountService {
    store: DynStore,
}

impl AccountService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Open a zero-balance account for the caller.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: name is empty, shorter than 3 or longer than 50 characters
    pub async fn create_account(
        &self,
        actor: Uuid,
        request: CreateAccountRequest,
    ) -> Result<AccountResponse, AppError> {
        let name = request.validated_name()?;
        let account = self.store.create_account(actor, &name).await?;

        tracing::info!(account_id = %account.id, user_id = %actor, "account created");

        Ok(account.into())
    }

    /// The caller's own accounts, newest first.
    pub async fn list_accounts(&self, actor: Uuid) -> Result<Vec<AccountResponse>, AppError> {
        let accounts = self.store.list_accounts_by_user(actor).await?;
        Ok(accounts.into_iter().map(Into::into).collect())
    }

    /// Accounts of `user_id`, e.g. to pick a transfer destination.
    ///
    /// Balances are only included when the caller is that user.
    ///
    /// # Errors
    ///
    /// - `UserNotFound`: no user with that id
    pub async fn list_accounts_by_user(
        &self,
        actor: Uuid,
        user_id: Uuid,
    ) -> Result<AccountListing, AppError> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(AppError::UserNotFound);
        }

        let accounts = self.store.list_accounts_by_user(user_id).await?;
        let listing = if actor == user_id {
            AccountListing::Owned(accounts.into_iter().map(Into::into).collect())
        } else {
            AccountListing::Foreign(accounts.into_iter().map(Into::into).collect())
        };

        Ok(listing)
    }
}
