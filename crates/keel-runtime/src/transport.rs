//! The custom-function transport - `spec.md` §6's action request envelope
//! and §9 Design Notes: "abstract behind a single `Transport` capability
//! `(context, request) -> response`; concrete HTTP transport is one
//! implementation, in-process is another for tests."

use crate::context::RequestContext;
use crate::error::RuntimeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// `spec.md` §6: `{operation, inputs, context: {headers, identity?, env,
/// secrets}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    pub operation: String,
    pub inputs: JsonValue,
    pub context: JsonValue,
}

impl ActionRequest {
    pub fn new(operation: impl Into<String>, inputs: JsonValue, ctx: &RequestContext) -> Self {
        Self { operation: operation.into(), inputs, context: ctx.to_transport_context() }
    }
}

/// `spec.md` §6: `{result?: any, error?: {code, message}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    pub result: Option<JsonValue>,
    pub error: Option<ActionErrorEnvelope>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionErrorEnvelope {
    pub code: String,
    pub message: String,
}

/// The capability custom `read`/`write` actions delegate to once the
/// dispatcher has decided `Implementation::Custom` applies.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: ActionRequest) -> Result<ActionResponse, RuntimeError>;
}

/// Posts the envelope as `application/json` to a fixed URL, per `spec.md`
/// §6. The URL is configured once at startup, not derived per-call, since
/// one runtime process serves one schema's worth of custom functions.
pub struct HttpTransport {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, url: reqwest::Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ActionRequest) -> Result<ActionResponse, RuntimeError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| RuntimeError::Internal(format!("custom function transport error: {err}")))?;

        response
            .json::<ActionResponse>()
            .await
            .map_err(|err| RuntimeError::Internal(format!("malformed custom function response: {err}")))
    }
}

/// An in-process stand-in for tests: dispatches to a boxed closure instead
/// of making an HTTP call, per Design Notes §9.
pub struct InMemoryTransport {
    handler: Arc<dyn Fn(&ActionRequest) -> Result<ActionResponse, RuntimeError> + Send + Sync>,
}

impl InMemoryTransport {
    pub fn new(handler: impl Fn(&ActionRequest) -> Result<ActionResponse, RuntimeError> + Send + Sync + 'static) -> Self {
        Self { handler: Arc::new(handler) }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn call(&self, request: ActionRequest) -> Result<ActionResponse, RuntimeError> {
        (self.handler)(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_transport_round_trips_a_result() {
        let transport = InMemoryTransport::new(|req| {
            Ok(ActionResponse { result: Some(serde_json::json!({ "echo": req.operation })), error: None })
        });
        let ctx = RequestContext::new();
        let response = transport.call(ActionRequest::new("sendWelcomeEmail", serde_json::json!({}), &ctx)).await.unwrap();
        assert_eq!(response.result.unwrap()["echo"], "sendWelcomeEmail");
    }
}
