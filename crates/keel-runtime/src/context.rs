//! The per-request context threaded through dispatch - `ctx.identity`/
//! `ctx.now` as seen from `@where`/`@set`/`@permission` expressions
//! (`spec.md` §4.C), plus the headers/env/secrets the custom-function
//! transport envelope needs (`spec.md` §6). Grounded on Design Notes §9:
//! "express as an explicit `AuthEnv` value... avoid process-wide
//! singletons so tests can stub them" - this is that same discipline
//! applied to the request-scoped half of the picture.

use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// The authenticated caller's claims, keyed by the implicit `Identity`
/// model's field names (`id`, `email`, `emailVerified`, ...). `None` means
/// the request carried no (or an unverified) token.
pub type IdentityClaims = Map<String, JsonValue>;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Option<IdentityClaims>,
    pub headers: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub secrets: HashMap<String, String>,
    /// Fixed at request start so `ctx.now` is stable across every
    /// expression evaluated during one invocation, matching the
    /// determinism expectations of `spec.md` §5.
    pub now: chrono::DateTime<chrono::Utc>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self { now: chrono::Utc::now(), ..Default::default() }
    }

    pub fn with_identity(mut self, identity: IdentityClaims) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn identity_field(&self, name: &str) -> JsonValue {
        self.identity
            .as_ref()
            .and_then(|i| i.get(name))
            .cloned()
            .unwrap_or(JsonValue::Null)
    }

    /// The subset of this context serialized into the custom-function
    /// transport envelope's `context` object (`spec.md` §6).
    pub fn to_transport_context(&self) -> JsonValue {
        serde_json::json!({
            "headers": self.headers,
            "identity": self.identity,
            "env": self.env,
            "secrets": self.secrets,
        })
    }
}
