//! Short-lived bearer-token signing for the Kling API.
//!
//! Kling authenticates each request with an HS256-signed JWT derived from a
//! long-lived access/secret key pair. Tokens carry `iat`/`nbf`/`exp` claims
//! and are valid for 30 minutes; a fresh token is signed per request.

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token validity window (30 minutes).
pub const TOKEN_TTL_SECS: i64 = 1800;

/// Not-before skew tolerated for clock drift (5 seconds).
pub const TOKEN_NBF_SKEW_SECS: i64 = 5;

/// Claims embedded in every Kling bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer -- the Kling access key.
    pub iss: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Not-before time (UTC Unix timestamp, slightly in the past).
    pub nbf: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
}

/// Sign a fresh bearer token for the given key pair.
///
/// # Errors
///
/// Returns a `jsonwebtoken` error if signing fails (malformed key material).
pub fn sign_bearer_token(
    access_key: &str,
    secret_key: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = unix_now();
    let claims = Claims {
        iss: access_key.to_string(),
        exp: now + TOKEN_TTL_SECS,
        nbf: now - TOKEN_NBF_SKEW_SECS,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )
}

/// Current UTC time as a Unix timestamp.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    fn decode_claims(token: &str, secret: &str) -> Claims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "nbf", "iat"]);
        decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .expect("token should verify against the signing secret")
            .claims
    }

    #[test]
    fn test_token_verifies_with_signing_secret() {
        let token = sign_bearer_token("access-1", "secret-1").unwrap();
        let claims = decode_claims(&token, "secret-1");
        assert_eq!(claims.iss, "access-1");
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let token = sign_bearer_token("access-1", "secret-1").unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_claims_carry_thirty_minute_window() {
        let token = sign_bearer_token("ak", "sk").unwrap();
        let claims = decode_claims(&token, "sk");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
        assert_eq!(claims.iat - claims.nbf, TOKEN_NBF_SKEW_SECS);
    }

    #[test]
    fn test_token_has_three_segments() {
        let token = sign_bearer_token("ak", "sk").unwrap();
        assert_eq!(token.split('.').count(), 3);
    }
}
