//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::Deserialize;

/// Which storage engine backs accounts, products and the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// PostgreSQL via sqlx (production)
    Postgres,
    /// Process-local store with per-row locks (development and tests)
    Memory,
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `STORAGE_BACKEND` (optional): `postgres` (default) or `memory`
/// - `DATABASE_URL` (required for postgres): PostgreSQL connection string
/// - `DB_MAX_CONNECTIONS` (optional): pool size, defaults to 10
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8080
/// - `JWT_SECRET` (required): key used to sign bearer tokens
/// - `TOKEN_TTL_HOURS` (optional): token lifetime, 1 to 8760, defaults to 24
/// - `LOCK_TIMEOUT_MS`, `MAX_RETRIES`, `RETRY_BACKOFF_MS` (optional): contention handling
/// - `ALLOW_SAME_OWNER_TRANSFERS` (optional): defaults to true
/// - `ADMIN_EMAIL`, `ADMIN_USERNAME`, `ADMIN_PASSWORD`, `ADMIN_FULL_NAME` (optional): bootstrap admin
/// - `SEED_DEMO_PRODUCTS` (optional): defaults to false
/// - `CORS_ALLOWED_ORIGIN` (optional): any origin when unset
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_backend")]
    pub storage_backend: StorageBackend,

    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_true")]
    pub allow_same_owner_transfers: bool,

    pub admin_email: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_full_name: Option<String>,

    #[serde(default)]
    pub seed_demo_products: bool,

    pub cors_allowed_origin: Option<String>,
}

/// Configuration problems detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingJwtSecret,

    #[error("DATABASE_URL is required when STORAGE_BACKEND=postgres")]
    MissingDatabaseUrl,

    #[error("TOKEN_TTL_HOURS must be between 1 and {max}, got {0}", max = MAX_TOKEN_TTL_HOURS)]
    InvalidTokenTtl(i64),
}

/// One year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

fn default_backend() -> StorageBackend {
    StorageBackend::Postgres
}

fn default_max_connections() -> u32 {
    10
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    8080
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

/// Credentials for the admin user created at startup.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Environment variable values cannot be parsed into expected types
    /// - `JWT_SECRET` is missing or empty
    /// - `DATABASE_URL` is missing while the postgres backend is selected
    /// - `TOKEN_TTL_HOURS` is not a positive number of hours up to a year
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }

        if self.storage_backend == StorageBackend::Postgres && self.database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            return Err(ConfigError::InvalidTokenTtl(self.token_ttl_hours));
        }

        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Admin bootstrap credentials, only when all four variables are present.
    pub fn admin_seed(&self) -> Option<AdminSeed> {
        Some(AdminSeed {
            email: self.admin_email.clone().filter(|v| !v.is_empty())?,
            username: self.admin_username.clone().filter(|v| !v.is_empty())?,
            password: self.admin_password.clone().filter(|v| !v.is_empty())?,
            full_name: self.admin_full_name.clone().filter(|v| !v.is_empty())?,
        })
    }
}
