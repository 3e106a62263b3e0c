//! Session token generation and the cookie contract constants.
//!
//! Transport mechanics (Set-Cookie headers) live in the gateway; the
//! engine only generates tokens and defines the contract both sides agree
//! on. Tokens are minted at signup and re-issued (same value, fresh
//! max-age) on every accepting decision.

use rand::RngCore;

/// Cookie name carrying the session token.
pub const SESSION_COOKIE: &str = "sessionId";

/// Session lifetime: 180 days.
pub const SESSION_MAX_AGE_DAYS: i64 = 180;

/// Generate a fresh session token: 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_format() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }
}
