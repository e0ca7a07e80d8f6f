//! Bearer token signing and verification.
//!
//! Tokens are compact HS256 JWTs: `base64url(header).base64url(claims).base64url(mac)`
//! where `mac` is HMAC-SHA256 over the first two segments, keyed with
//! `JWT_SECRET`.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::{error::AppError, models::user::Role};

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Payload carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,

    /// Role at issue time, surfaced as [`AuthContext::role`](crate::middleware::auth::AuthContext)
    pub role: Role,

    /// Expiry as seconds since the Unix epoch
    pub exp: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"**redacted**")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, AppError> {
        self.issue_at(user_id, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = Claims {
            user_id,
            role,
            exp: (now + self.ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| AppError::Storage(format!("failed to encode claims: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&signing_input).finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Check signature, algorithm and expiry; any failure is `Unauthenticated`.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AppError> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or(AppError::Unauthenticated)?;
        let (header, payload) = signing_input
            .split_once('.')
            .ok_or(AppError::Unauthenticated)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AppError::Unauthenticated)?;
        self.mac(signing_input)
            .verify_slice(&signature)
            .map_err(|_| AppError::Unauthenticated)?;

        let header: Header = decode_segment(header)?;
        if header.alg != "HS256" {
            return Err(AppError::Unauthenticated);
        }

        let claims: Claims = decode_segment(payload)?;
        if claims.exp <= now.timestamp() {
            return Err(AppError::Unauthenticated);
        }

        Ok(claims)
    }

    fn mac(&self, input: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC key length is valid");
        mac.update(input.as_bytes());
        mac
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AppError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AppError::Unauthenticated)?;
    serde_json::from_slice(&bytes).map_err(|_| AppError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", Duration::hours(1))
    }

    #[test]
    fn issued_token_verifies_with_its_claims() {
        let user_id = Uuid::new_v4();
        let token = signer().issue(user_id, Role::Admin).unwrap();

        let claims = signer().verify(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - Duration::hours(2);
        let token = signer()
            .issue_at(Uuid::new_v4(), Role::User, issued)
            .unwrap();

        assert!(matches!(
            signer().verify(&token),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let other = TokenSigner::new("different-secret", Duration::hours(1));
        let token = other.issue(Uuid::new_v4(), Role::User).unwrap();

        assert!(signer().verify(&token).is_err());
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = signer().issue(Uuid::new_v4(), Role::User).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged_claims = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"user_id":"{}","role":"admin","exp":{}}}"#,
            Uuid::new_v4(),
            i64::MAX
        ));
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert!(signer().verify(&forged).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        for token in ["", "abc", "a.b", "a.b.c", "..."] {
            assert!(signer().verify(token).is_err(), "{token:?}");
        }
    }
}
