//! Per-request context.
//!
//! A [`RequestContext`] is created with default values when a request
//! arrives, handed by `&mut` to each hook in turn, and dropped once the
//! response has been sent. It is never shared between requests.

use std::time::{Duration, Instant};

use http::StatusCode;
use serde::Serialize;

use crate::method::Method;

/// The caller a `preHandler` hook resolved. Defaults to an empty name and
/// age `0` until some hook fills it in.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct User {
    pub name: String,
    pub age: u32,
}

/// Mutable per-request state shared by the hooks and the handler of one
/// request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Populated by `preHandler` hooks.
    pub user: User,
    id: u64,
    method: Option<Method>,
    path: String,
    started: Instant,
    status: Option<StatusCode>,
}

impl RequestContext {
    pub fn new(id: u64, method: Option<Method>, path: impl Into<String>) -> Self {
        Self {
            user: User::default(),
            id,
            method,
            path: path.into(),
            started: Instant::now(),
            status: None,
        }
    }

    /// Sequential request id, unique for the life of the process.
    pub fn id(&self) -> u64 { self.id }

    /// `None` when the request used a method lintel does not route.
    pub fn method(&self) -> Option<Method> { self.method }

    pub fn path(&self) -> &str { &self.path }

    /// Time since the request arrived.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The final status code. Only set once the response is finalised, so
    /// `onResponse` hooks see `Some` and earlier phases see `None`.
    pub fn status(&self) -> Option<StatusCode> { self.status }

    pub(crate) fn finalize(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_default_user_and_no_status() {
        let ctx = RequestContext::new(1, Some(Method::Get), "/");
        assert_eq!(ctx.user, User { name: String::new(), age: 0 });
        assert_eq!(ctx.status(), None);
        assert_eq!(ctx.path(), "/");
    }

    #[test]
    fn finalize_records_status() {
        let mut ctx = RequestContext::new(7, None, "/x");
        ctx.finalize(StatusCode::CREATED);
        assert_eq!(ctx.status(), Some(StatusCode::CREATED));
        assert_eq!(ctx.id(), 7);
    }
}
