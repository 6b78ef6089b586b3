//! Route table.
//!
//! One `matchit` tree per HTTP method. Paths are matched as exact strings:
//! `{param}` and catch-all segments are rejected at registration, so a
//! lookup either finds the one route registered under that literal path or
//! nothing. The table is built once at startup and only read afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;

use crate::context::RequestContext;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::hooks::{self, BoxedHook, GroupId, HookFuture};
use crate::method::Method;
use crate::schema::{SchemaDef, SchemaRegistry};

// ── Registration ──────────────────────────────────────────────────────────────

/// Everything one route declares, enumerated at registration time.
///
/// Schema ids are resolved against the [`SchemaRegistry`] when the route is
/// registered, so a typo fails startup instead of the first request.
///
/// ```rust
/// use http::StatusCode;
/// use lintel::{Request, RouteDef};
///
/// # async fn create_user(_: Request) -> StatusCode { StatusCode::CREATED }
/// let route = RouteDef::new(create_user)
///     .body_schema("userSchema")
///     .response_schema(StatusCode::CREATED, "userCreated")
///     .pre_handler(|_ctx| Box::pin(async { Ok(()) }));
/// ```
pub struct RouteDef {
    handler: BoxedHandler,
    body: Option<String>,
    responses: Vec<(StatusCode, String)>,
    pre_handlers: Vec<BoxedHook>,
}

impl RouteDef {
    pub fn new(handler: impl Handler) -> Self {
        Self {
            handler: handler.into_boxed_handler(),
            body: None,
            responses: Vec::new(),
            pre_handlers: Vec::new(),
        }
    }

    /// Requests must carry a JSON body matching schema `id`.
    pub fn body_schema(mut self, id: impl Into<String>) -> Self {
        self.body = Some(id.into());
        self
    }

    /// Documents the body shape of `status` responses.
    pub fn response_schema(mut self, status: StatusCode, id: impl Into<String>) -> Self {
        self.responses.push((status, id.into()));
        self
    }

    /// Appends a hook that runs after every global and group `preHandler`
    /// hook, for this route only.
    pub fn pre_handler<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> HookFuture<'a> + Send + Sync + 'static,
    {
        self.pre_handlers.push(hooks::hook(f));
        self
    }

    pub(crate) fn resolve(
        self,
        method: Method,
        path: String,
        group: Option<GroupId>,
        schemas: &SchemaRegistry,
    ) -> Result<Route, Error> {
        let body = self.body.as_deref().map(|id| schemas.get(id)).transpose()?;
        let mut responses = HashMap::with_capacity(self.responses.len());
        for (status, id) in &self.responses {
            responses.insert(*status, schemas.get(id)?);
        }
        Ok(Route {
            method,
            path,
            group,
            body,
            responses,
            pre_handlers: self.pre_handlers,
            handler: self.handler,
        })
    }
}

/// A registered route. Immutable once in the table.
pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) group: Option<GroupId>,
    pub(crate) body: Option<Arc<SchemaDef>>,
    pub(crate) responses: HashMap<StatusCode, Arc<SchemaDef>>,
    pub(crate) pre_handlers: Vec<BoxedHook>,
    pub(crate) handler: BoxedHandler,
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// Maps `(method, path)` to a route.
#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<Route>>>,
    len: usize,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `route`. An existing route under the same method and path is
    /// left in place.
    pub(crate) fn insert(&mut self, route: Route) -> Result<(), Error> {
        check_path(&route.path)?;

        let tree = self.routes.entry(route.method).or_default();
        if tree.at(&route.path).is_ok() {
            return Err(Error::DuplicateRoute { method: route.method, path: route.path });
        }

        let (method, path) = (route.method, route.path.clone());
        tree.insert(path.clone(), Arc::new(route)).map_err(|e| match e {
            matchit::InsertError::Conflict { .. } => Error::DuplicateRoute { method, path: path.clone() },
            other => Error::InvalidRoute { path: path.clone(), reason: other.to_string() },
        })?;
        self.len += 1;
        Ok(())
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Option<Arc<Route>> {
        let tree = self.routes.get(&method)?;
        tree.at(path).ok().map(|m| Arc::clone(m.value))
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

fn check_path(path: &str) -> Result<(), Error> {
    let reason = if !path.starts_with('/') {
        "must start with `/`"
    } else if path.contains(['{', '}', '*']) {
        "only literal paths are supported"
    } else {
        return Ok(());
    };
    Err(Error::InvalidRoute { path: path.to_owned(), reason: reason.to_owned() })
}
