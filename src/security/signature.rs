//! Webhook signatures.
//!
//! The gateway signs each posted body with the shared secret and sends
//! `X-Signature: sha256=<hex>`, the hex HMAC-SHA256 of the raw body.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const HEADER: &str = "x-signature";

/// Computes the header value for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Checks a header value against `body` in constant time.
pub fn verify(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_sig) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let header = sign("secret", br#"{"post_type":"message"}"#);
        assert!(header.starts_with("sha256="));
        assert!(verify("secret", br#"{"post_type":"message"}"#, &header));
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign("secret", b"body");
        assert!(!verify("other", b"body", &header));
    }

    #[test]
    fn test_tampered_body() {
        let header = sign("secret", b"body");
        assert!(!verify("secret", b"body!", &header));
    }

    #[test]
    fn test_malformed_header() {
        let header = sign("secret", b"body");
        assert!(!verify("secret", b"body", header.trim_start_matches("sha256=")));
        assert!(!verify("secret", b"body", "sha256=zz"));
        assert!(!verify("secret", b"body", ""));
    }
}
