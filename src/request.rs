//! The request as a handler sees it.

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{RequestContext, User};
use crate::method::Method;

/// An incoming HTTP request, after every `preHandler` hook has run.
///
/// When the route declares a body schema, the body has already been parsed
/// and validated; [`json`](Request::json) then deserializes the validated
/// value without touching the raw bytes again.
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    json: Option<Value>,
    ctx: RequestContext,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        headers: HeaderMap,
        body: Bytes,
        json: Option<Value>,
        ctx: RequestContext,
    ) -> Self {
        Self { method, path, headers, body, json, ctx }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values are
    /// treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The schema-validated body, if the route declared a body schema.
    pub fn json_value(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Deserializes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.json {
            Some(v) => T::deserialize(v),
            None => serde_json::from_slice(&self.body),
        }
    }

    /// The context the hooks populated.
    pub fn context(&self) -> &RequestContext { &self.ctx }

    pub fn user(&self) -> &User { &self.ctx.user }
}
