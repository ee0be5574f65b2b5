//! JWT issue/verify and OIDC discovery/JWKS caching - component H of
//! `spec.md` §4, grounded on `original_source/runtime/oauth/access_token.go`
//! and `runtime/auth/auth.go`.

pub mod error;
pub mod oidc;
pub mod token;

pub use error::AuthError;
pub use oidc::{AuthEnv, ExternalIssuer, JwkSet, OpenIdConfiguration};
pub use token::{
    extract_unverified_subject, issue_access_token, verify_access_token, AccessTokenClaims, DEFAULT_ACCESS_TOKEN_EXPIRY,
    KEEL_ISSUER,
};
