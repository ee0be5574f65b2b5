//! OIDC discovery and JWKS caching. Grounded on
//! `original_source/runtime/auth/auth.go`'s `CheckIssuers`/`processIssuer`/
//! `JwkCache`/`RequestCache`, per `spec.md` §4.H.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// One configured external issuer - mirrors `auth.go`'s `ExternalIssuer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIssuer {
    pub iss: String,
    pub audience: Option<String>,
}

/// The subset of an issuer's `/.well-known/openid-configuration` document
/// this runtime needs, mirroring `auth.go`'s `OpenidConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    #[serde(rename = "jwks_uri")]
    pub jwks_uri: String,
}

/// A parsed JSON Web Key Set, kept as raw JSON - signature verification
/// is done per-key by `jsonwebtoken`, which doesn't need a typed `Jwk`
/// struct to operate on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet(pub serde_json::Value);

struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

/// Default entry lifetime when a response carries no usable
/// `Cache-Control` header - matches `patrickmn/go-cache`'s default expiry,
/// which is what `auth.go`'s `RequestCache`/`JwkCache` are constructed
/// with (`cache.New(5*time.Minute, 10*time.Minute)`).
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Holds everything the OIDC/JWKS flow needs as one explicit value rather
/// than process-wide singletons, so tests can construct and discard their
/// own instance - `spec.md` §9 Design Notes.
pub struct AuthEnv {
    http: reqwest::Client,
    oidc_cache: Mutex<HashMap<String, CacheEntry<OpenIdConfiguration>>>,
    jwks_cache: Mutex<HashMap<String, CacheEntry<JwkSet>>>,
}

impl AuthEnv {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http, oidc_cache: Mutex::new(HashMap::new()), jwks_cache: Mutex::new(HashMap::new()) }
    }

    /// Loads OIDC config and JWKS for each issuer, dropping any that fail
    /// to resolve. Mirrors `CheckIssuers`'s "collect only the valid ones"
    /// behavior exactly - a bad issuer never aborts startup.
    pub async fn check_issuers(&self, issuers: &[ExternalIssuer]) -> Vec<ExternalIssuer> {
        let mut valid = Vec::new();
        for issuer in issuers {
            match self.process_issuer(issuer).await {
                Ok(()) => valid.push(issuer.clone()),
                Err(err) => {
                    tracing::error!(issuer = %issuer.iss, error = %err, "failed to load OpenID config");
                }
            }
        }
        valid
    }

    async fn process_issuer(&self, issuer: &ExternalIssuer) -> Result<(), AuthError> {
        let oidc = self.openid_configuration(&issuer.iss).await?;
        self.jwks(&oidc.jwks_uri).await?;
        Ok(())
    }

    pub async fn openid_configuration(&self, issuer: &str) -> Result<OpenIdConfiguration, AuthError> {
        if let Some(cached) = self.cached(&self.oidc_cache, issuer).await {
            return Ok(cached);
        }

        let url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| AuthError::OidcDiscovery { issuer: issuer.to_string(), source })?;
        let ttl = ttl_from_cache_control(response.headers().get("cache-control").and_then(|v| v.to_str().ok()));
        let config: OpenIdConfiguration = response
            .json()
            .await
            .map_err(|source| AuthError::OidcDiscovery { issuer: issuer.to_string(), source })?;

        self.insert(&self.oidc_cache, issuer.to_string(), config.clone(), ttl).await;
        Ok(config)
    }

    pub async fn jwks(&self, jwks_url: &str) -> Result<JwkSet, AuthError> {
        if let Some(cached) = self.cached(&self.jwks_cache, jwks_url).await {
            return Ok(cached);
        }

        let response = self
            .http
            .get(jwks_url)
            .send()
            .await
            .map_err(|source| AuthError::JwksFetch { url: jwks_url.to_string(), source })?;
        let ttl = ttl_from_cache_control(response.headers().get("cache-control").and_then(|v| v.to_str().ok()));
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|source| AuthError::JwksFetch { url: jwks_url.to_string(), source })?;
        let jwks = JwkSet(body);

        self.insert(&self.jwks_cache, jwks_url.to_string(), jwks.clone(), ttl).await;
        Ok(jwks)
    }

    async fn cached<T: Clone>(&self, cache: &Mutex<HashMap<String, CacheEntry<T>>>, key: &str) -> Option<T> {
        let guard = cache.lock().await;
        guard.get(key).filter(|entry| entry.expires_at > Instant::now()).map(|entry| entry.value.clone())
    }

    async fn insert<T>(&self, cache: &Mutex<HashMap<String, CacheEntry<T>>>, key: String, value: T, ttl: Duration) {
        let mut guard = cache.lock().await;
        guard.insert(key, CacheEntry { value, expires_at: Instant::now() + ttl });
    }
}

/// Parses a `Cache-Control` header for `max-age`; `no-store`/`no-cache`
/// or a missing/unparseable header falls back to [`DEFAULT_TTL`].
fn ttl_from_cache_control(header: Option<&str>) -> Duration {
    let Some(header) = header else {
        return DEFAULT_TTL;
    };
    if header.contains("no-store") || header.contains("no-cache") {
        return DEFAULT_TTL;
    }
    header
        .split(',')
        .find_map(|directive| directive.trim().strip_prefix("max-age="))
        .and_then(|secs| secs.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_age_directive_is_parsed() {
        assert_eq!(ttl_from_cache_control(Some("public, max-age=600")), Duration::from_secs(600));
    }

    #[test]
    fn no_store_falls_back_to_default_ttl() {
        assert_eq!(ttl_from_cache_control(Some("no-store")), DEFAULT_TTL);
    }

    #[test]
    fn missing_header_falls_back_to_default_ttl() {
        assert_eq!(ttl_from_cache_control(None), DEFAULT_TTL);
    }
}
