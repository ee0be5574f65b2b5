//! Access token issue/verify. Grounded on
//! `original_source/runtime/oauth/access_token.go`'s `GenerateAccessToken`/
//! `ValidateAccessToken`, per `spec.md` §4.H.

use crate::error::AuthError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const KEEL_ISSUER: &str = "https://keel.so";
pub const DEFAULT_ACCESS_TOKEN_EXPIRY: Duration = Duration::from_secs(60 * 60 * 24);

/// Mirrors `jwt.RegisteredClaims` - `sub`/`aud`/`iss`/`iat`/`exp` only. No
/// custom claims: `spec.md` §4.H names exactly this claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub aud: Vec<String>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs an RS256 access token for `identity_id`, valid for `duration`.
pub fn issue_access_token(
    identity_id: &str,
    duration: Duration,
    private_key: &EncodingKey,
) -> Result<(String, Duration), AuthError> {
    let now = unix_timestamp_secs();
    let claims = AccessTokenClaims {
        sub: identity_id.to_string(),
        aud: Vec::new(),
        iss: KEEL_ISSUER.to_string(),
        iat: now,
        exp: now + duration.as_secs() as i64,
    };

    let header = Header::new(Algorithm::RS256);
    let token = jsonwebtoken::encode(&header, &claims, private_key)?;
    Ok((token, duration))
}

/// Verifies `token`'s signature and expiry, and - if `audience` is given -
/// that it's listed in the token's `aud`. Returns `(identity_id, issuer)`
/// on success. Expiry is distinguished from every other failure, matching
/// `ValidateAccessToken`'s `jwt.ValidationErrorExpired` special case.
pub fn verify_access_token(
    token: &str,
    public_key: &DecodingKey,
    audience: Option<&str>,
) -> Result<(String, String), AuthError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    validation.validate_aud = false;

    let decoded = jsonwebtoken::decode::<AccessTokenClaims>(token, public_key, &validation).map_err(|err| {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    })?;

    let claims = decoded.claims;

    if let Some(audience) = audience {
        if !claims.aud.iter().any(|a| a == audience) {
            return Err(AuthError::InvalidToken);
        }
    }

    if claims.sub.is_empty() {
        return Err(AuthError::IdentityNotFound);
    }

    Ok((claims.sub, claims.iss))
}

/// Decodes the claims of a foreign-issued token without verifying its
/// signature - used only to read `sub`/`iss`/`kid` before the issuer's
/// JWKS has been fetched. Never use the result for authorization.
pub fn extract_unverified_subject(token: &str) -> Result<String, AuthError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let dummy_key = DecodingKey::from_secret(&[]);
    let decoded = jsonwebtoken::decode::<AccessTokenClaims>(token, &dummy_key, &validation)?;
    Ok(decoded.claims.sub)
}

fn unix_timestamp_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keypair() -> (EncodingKey, DecodingKey) {
        // A throwaway RSA keypair, PEM-encoded, for unit tests only.
        let private_pem = include_bytes!("../tests/fixtures/test_private_key.pem");
        let public_pem = include_bytes!("../tests/fixtures/test_public_key.pem");
        (
            EncodingKey::from_rsa_pem(private_pem).expect("valid test private key"),
            DecodingKey::from_rsa_pem(public_pem).expect("valid test public key"),
        )
    }

    #[test]
    fn issued_token_verifies_back_to_the_same_identity() {
        let (private_key, public_key) = test_keypair();
        let (token, _) = issue_access_token("identity_123", Duration::from_secs(3600), &private_key).unwrap();
        let (identity_id, issuer) = verify_access_token(&token, &public_key, None).unwrap();
        assert_eq!(identity_id, "identity_123");
        assert_eq!(issuer, KEEL_ISSUER);
    }

    #[test]
    fn expired_token_is_reported_distinctly() {
        let (private_key, public_key) = test_keypair();
        let (token, _) = issue_access_token("identity_123", Duration::from_secs(0), &private_key).unwrap();
        std::thread::sleep(Duration::from_secs(1));
        let result = verify_access_token(&token, &public_key, None);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn mismatched_audience_is_rejected() {
        let (private_key, public_key) = test_keypair();
        let (token, _) = issue_access_token("identity_123", Duration::from_secs(3600), &private_key).unwrap();
        let result = verify_access_token(&token, &public_key, Some("https://example.com"));
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }
}
