//! Password hashing.
//!
//! Stored form is `hex(salt) || hex(HMAC-SHA256(key = salt, password))`, with
//! a fresh 16-byte random salt per password.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SALT_BYTES: usize = 16;
const SALT_HEX_CHARS: usize = SALT_BYTES * 2;

/// Hash a password with a new random salt.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_BYTES] = rand::random();
    let digest = mac_for(&salt, password).finalize().into_bytes();

    format!("{}{}", hex::encode(salt), hex::encode(digest))
}

/// Check a password against its stored hash in constant time.
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.len() <= SALT_HEX_CHARS || !stored.is_char_boundary(SALT_HEX_CHARS) {
        return false;
    }
    let (salt_hex, digest_hex) = stored.split_at(SALT_HEX_CHARS);

    let (Ok(salt), Ok(digest)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };

    mac_for(&salt, password).verify_slice(&digest).is_ok()
}

fn mac_for(salt: &[u8], password: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC key length is valid");
    mac.update(password.as_bytes());
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let stored = hash_password("correct horse");
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("Correct horse", &stored));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("hunter22");
        let b = hash_password("hunter22");

        assert_ne!(a, b);
        assert_eq!(a.len(), SALT_HEX_CHARS + 64);
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "abcd"));
        assert!(!verify_password("anything", &"z".repeat(96)));
    }
}
