//! Push Secrets
//!
//! A secret is an HMAC-SHA256 over the registration binding, keyed with fresh
//! random bytes, so two registrations of the same binding never share one.

use crate::error::{Error, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of a generated secret in hex characters
pub const SECRET_HEX_LEN: usize = 64;

/// Generate a new secret for a binding
pub fn generate_secret(push_type: &str, token: &str, node: &str) -> Result<String> {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| Error::Internal(format!("HMAC key rejected: {}", e)))?;
    mac.update(push_type.as_bytes());
    mac.update(b":");
    mac.update(token.as_bytes());
    mac.update(b":");
    mac.update(node.as_bytes());
    mac.update(b":");
    mac.update(&Utc::now().timestamp_micros().to_be_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compare a presented secret with the stored one in constant time
pub fn secrets_match(presented: &str, stored: &str) -> bool {
    let (a, b) = (presented.as_bytes(), stored.as_bytes());
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_format() {
        let secret = generate_secret("fcm", "tok-1", "node-1").unwrap();
        assert_eq!(secret.len(), SECRET_HEX_LEN);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_secrets_are_unpredictable() {
        let a = generate_secret("fcm", "tok-1", "node-1").unwrap();
        let b = generate_secret("fcm", "tok-1", "node-1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("abcdef", "abcdef"));
        assert!(!secrets_match("abcdef", "abcdeg"));
        assert!(!secrets_match("abc", "abcdef"));
        assert!(!secrets_match("", "abcdef"));
    }
}
