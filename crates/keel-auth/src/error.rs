//! Error taxonomy for issuing/verifying access tokens and resolving OIDC
//! issuers. Grounded on `original_source/runtime/oauth/access_token.go`'s
//! sentinel errors (`ErrInvalidToken`, `ErrTokenExpired`,
//! `ErrIdentityNotFound`) and `runtime/auth/auth.go`'s issuer-resolution
//! failure handling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token cannot be parsed or verified as a valid JWT")]
    InvalidToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("identity not found")]
    IdentityNotFound,
    #[error("no signing key configured")]
    NoSigningKey,
    #[error("failed to resolve OpenID configuration for issuer \"{issuer}\": {source}")]
    OidcDiscovery { issuer: String, #[source] source: reqwest::Error },
    #[error("failed to fetch JWKS from \"{url}\": {source}")]
    JwksFetch { url: String, #[source] source: reqwest::Error },
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}
