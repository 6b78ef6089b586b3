//! Application assembly and per-request dispatch.
//!
//! [`AppBuilder`] collects schemas, hooks, routes, and connectors at
//! startup. Every registration is checked immediately, so a malformed
//! schema or a duplicate route stops the process before it binds a port.
//! [`AppBuilder::build`] awaits the connectors and freezes everything into
//! an [`App`], which is cheap to clone and read-only from then on.
//!
//! # Request pipeline
//!
//! ```text
//! onRequest (global, group)
//!     │  405 unknown method / 404 no route
//!     ▼
//! body: read up to the body limit ── 413 too large / 400 unreadable
//!     ▼
//! body: parse JSON + validate against the route's body schema ── 400
//!     ▼
//! preHandler (global, group, route)
//!     ▼
//! handler ──▶ response schema check (off / warn / enforce)
//!     ▼
//! onResponse (global, group)   ← always runs, sees the final status
//! ```
//!
//! A failing hook in `onRequest` or `preHandler` short-circuits to `500`.
//! A failing `onResponse` hook is logged; the response is already final.
//! `HEAD` requests without a route of their own are served by the `GET`
//! route on the same path, with the body dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use clap::ValueEnum;
use http::header::HeaderValue;
use http::{HeaderMap, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::connector::Connector;
use crate::context::RequestContext;
use crate::error::Error;
use crate::hooks::{self, GroupId, HookFuture, HookPipeline, Phase, Scope};
use crate::method::Method;
use crate::request::Request;
use crate::response::{HttpError, IntoResponse, Response};
use crate::router::{Route, RouteDef, Router};
use crate::schema::{SchemaDef, SchemaRegistry};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Default maximum request body size: 1 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// What to do when a handler's response does not match the schema declared
/// for its status code.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum ResponseSchemaMode {
    /// Do not check.
    Off,
    /// Log the mismatch and send the response anyway.
    #[default]
    Warn,
    /// Replace the response with `500`.
    Enforce,
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Startup registration.
///
/// ```rust
/// use http::StatusCode;
/// use lintel::{AppBuilder, Json, Phase, Request, RouteDef, SchemaDef, Shape};
///
/// # async fn run() -> lintel::Result<()> {
/// let mut app = AppBuilder::new();
/// app.schema(SchemaDef::new("user", Shape::object().property("name", Shape::string()).required(["name"])))?;
/// app.hook(Phase::PreHandler, |ctx| {
///     ctx.user.name = "John Doe".into();
///     Box::pin(async { Ok(()) })
/// });
/// app.get("/", RouteDef::new(|_req: Request| async { Json(serde_json::json!({ "message": "Hello World" })) }))?;
///
/// let mut users = app.group("/api/users")?;
/// users.post("/", RouteDef::new(|_req: Request| async { StatusCode::CREATED }).body_schema("user"))?;
///
/// let app = app.build().await?;
/// # Ok(()) }
/// ```
pub struct AppBuilder {
    schemas: SchemaRegistry,
    hooks: HookPipeline,
    router: Router,
    connectors: Vec<Box<dyn Connector>>,
    body_limit: usize,
    response_schemas: ResponseSchemaMode,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            schemas: SchemaRegistry::new(),
            hooks: HookPipeline::new(),
            router: Router::new(),
            connectors: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
            response_schemas: ResponseSchemaMode::default(),
        }
    }

    /// Maximum request body size in bytes. Larger bodies get `413`.
    pub fn body_limit(&mut self, bytes: usize) -> &mut Self {
        self.body_limit = bytes;
        self
    }

    pub fn response_schemas(&mut self, mode: ResponseSchemaMode) -> &mut Self {
        self.response_schemas = mode;
        self
    }

    /// Registers a schema. Must happen before any route that names it.
    pub fn schema(&mut self, def: SchemaDef) -> Result<&mut Self, Error> {
        self.schemas.register(def)?;
        Ok(self)
    }

    /// Registers a global hook.
    pub fn hook<F>(&mut self, phase: Phase, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> HookFuture<'a> + Send + Sync + 'static,
    {
        self.hooks.register(phase, Scope::Global, hooks::hook(f));
        self
    }

    /// Registers a route outside any group. It only sees global hooks.
    pub fn route(&mut self, method: Method, path: &str, def: RouteDef) -> Result<&mut Self, Error> {
        self.add_route(method, path.to_owned(), None, def)?;
        Ok(self)
    }

    pub fn get(&mut self, path: &str, def: RouteDef) -> Result<&mut Self, Error> {
        self.route(Method::Get, path, def)
    }

    pub fn post(&mut self, path: &str, def: RouteDef) -> Result<&mut Self, Error> {
        self.route(Method::Post, path, def)
    }

    /// Opens the route group under `prefix`. Routes registered through the
    /// returned [`Group`] are mounted at `prefix + path` and also see the
    /// group's scoped hooks. Calling `group` again with the same prefix
    /// reopens the same group.
    pub fn group(&mut self, prefix: &str) -> Result<Group<'_>, Error> {
        let prefix = prefix.trim_end_matches('/');
        if (!prefix.is_empty() && !prefix.starts_with('/')) || prefix.contains(['{', '}', '*']) {
            return Err(Error::InvalidRoute {
                path: prefix.to_owned(),
                reason: "group prefix must be a literal path starting with `/`".to_owned(),
            });
        }
        Ok(Group { id: GroupId::new(prefix), app: self })
    }

    /// Adds a connector awaited by [`build`](AppBuilder::build).
    pub fn connector(&mut self, connector: impl Connector) -> &mut Self {
        self.connectors.push(Box::new(connector));
        self
    }

    fn add_route(
        &mut self,
        method: Method,
        path: String,
        group: Option<GroupId>,
        def: RouteDef,
    ) -> Result<(), Error> {
        let route = def.resolve(method, path, group, &self.schemas)?;
        debug!(method = %route.method, path = %route.path, "route registered");
        self.router.insert(route)
    }

    /// Awaits every connector, in registration order, and freezes the app.
    ///
    /// # Errors
    ///
    /// [`Error::Connect`] from the first connector that fails.
    pub async fn build(self) -> Result<App, Error> {
        for connector in &self.connectors {
            debug!(connector = connector.name(), "connecting");
            connector.connect().await?;
        }
        info!(
            routes = self.router.len(),
            schemas = self.schemas.len(),
            hooks = self.hooks.len(),
            "application ready"
        );
        Ok(App {
            inner: Arc::new(Inner {
                hooks: self.hooks,
                router: self.router,
                body_limit: self.body_limit,
                response_schemas: self.response_schemas,
                next_id: AtomicU64::new(1),
            }),
        })
    }
}

/// Registration handle for one route group.
pub struct Group<'a> {
    app: &'a mut AppBuilder,
    id: GroupId,
}

impl Group<'_> {
    pub fn id(&self) -> &GroupId {
        &self.id
    }

    /// Registers a hook scoped to this group.
    pub fn hook<F>(&mut self, phase: Phase, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> HookFuture<'a> + Send + Sync + 'static,
    {
        self.app.hooks.register(phase, Scope::Group(self.id.clone()), hooks::hook(f));
        self
    }

    /// Registers `prefix + path`.
    pub fn route(&mut self, method: Method, path: &str, def: RouteDef) -> Result<&mut Self, Error> {
        let full = format!("{}{path}", self.id.prefix());
        self.app.add_route(method, full, Some(self.id.clone()), def)?;
        Ok(self)
    }

    pub fn get(&mut self, path: &str, def: RouteDef) -> Result<&mut Self, Error> {
        self.route(Method::Get, path, def)
    }

    pub fn post(&mut self, path: &str, def: RouteDef) -> Result<&mut Self, Error> {
        self.route(Method::Post, path, def)
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// A frozen application, shared by every connection.
#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

struct Inner {
    hooks: HookPipeline,
    router: Router,
    body_limit: usize,
    response_schemas: ResponseSchemaMode,
    next_id: AtomicU64,
}

impl App {
    pub fn body_limit(&self) -> usize {
        self.inner.body_limit
    }

    /// Runs one request through the full pipeline. Never fails: every error
    /// is answered with an HTTP status.
    ///
    /// `body` is read only once `onRequest` has run and a route matched, and
    /// never past the configured body limit.
    pub async fn handle<B>(
        &self,
        method: &http::Method,
        path: &str,
        headers: HeaderMap,
        body: B,
    ) -> Response
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("request", id, %method, path);

        async move {
            let typed = Method::try_from(method).ok();
            let route = typed.and_then(|m| self.lookup(m, path));
            let group = route.as_ref().and_then(|r| r.group.clone());
            let mut ctx = RequestContext::new(id, typed, path);
            debug!("incoming request");

            let mut res = self.run(&mut ctx, method, route, group.as_ref(), headers, body).await;

            if typed == Some(Method::Head) {
                res.clear_body();
            }
            ctx.finalize(res.status_code());
            if let Err(e) = self.inner.hooks.run(Phase::OnResponse, group.as_ref(), &mut ctx).await {
                error!(error = %e, "onResponse hook failed after response was finalized");
            }
            if let Ok(v) = HeaderValue::from_str(&format!("req-{id}")) {
                res.insert_header(http::header::HeaderName::from_static("x-request-id"), v);
            }

            info!(
                status = res.status_code().as_u16(),
                elapsed_ms = ctx.elapsed().as_secs_f64() * 1000.0,
                "request completed"
            );
            res
        }
        .instrument(span)
        .await
    }

    /// `HEAD` falls back to the `GET` route on the same path.
    fn lookup(&self, method: Method, path: &str) -> Option<Arc<Route>> {
        let router = &self.inner.router;
        router.lookup(method, path).or_else(|| match method {
            Method::Head => router.lookup(Method::Get, path),
            _ => None,
        })
    }

    /// Everything up to and including the handler.
    async fn run<B>(
        &self,
        ctx: &mut RequestContext,
        raw_method: &http::Method,
        route: Option<Arc<Route>>,
        group: Option<&GroupId>,
        headers: HeaderMap,
        body: B,
    ) -> Response
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let hooks = &self.inner.hooks;

        if let Err(e) = hooks.run(Phase::OnRequest, group, ctx).await {
            return HttpError::internal(e.message()).into_response();
        }

        let Some(method) = ctx.method() else {
            return HttpError::new(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("method {raw_method} is not supported"),
            )
            .into_response();
        };
        let Some(route) = route else {
            return HttpError::new(
                StatusCode::NOT_FOUND,
                format!("Route {method}:{} not found", ctx.path()),
            )
            .into_response();
        };

        let body = match read_body(body, self.inner.body_limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(status = e.status().as_u16(), "body unreadable");
                return e.into_response();
            }
        };

        let json = match &route.body {
            Some(schema) => match parse_body(schema, &body) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(status = e.status().as_u16(), "body rejected");
                    return e.into_response();
                }
            },
            None => None,
        };

        if let Err(e) = hooks.run(Phase::PreHandler, group, ctx).await {
            return HttpError::internal(e.message()).into_response();
        }
        if let Err(e) = hooks::run_all(route.pre_handlers.iter(), Phase::PreHandler, ctx).await {
            return HttpError::internal(e.message()).into_response();
        }

        let req = Request::new(method, ctx.path().to_owned(), headers, body, json, ctx.clone());
        let res = route.handler.call(req).await;
        self.check_response(&route, res)
    }

    fn check_response(&self, route: &Route, res: Response) -> Response {
        let mode = self.inner.response_schemas;
        if mode == ResponseSchemaMode::Off {
            return res;
        }
        let Some(schema) = route.responses.get(&res.status_code()) else {
            return res;
        };

        let verdict = if res.is_json() {
            serde_json::from_slice::<Value>(res.body())
                .map_err(|e| format!("body is not valid JSON: {e}"))
                .and_then(|v| schema.validate(&v).map_err(|e| e.to_string()))
        } else {
            Err("body is not JSON".to_owned())
        };

        match (verdict, mode) {
            (Ok(()), _) | (Err(_), ResponseSchemaMode::Off) => res,
            (Err(reason), ResponseSchemaMode::Warn) => {
                warn!(schema = schema.id(), status = res.status_code().as_u16(), %reason, "response does not match schema");
                res
            }
            (Err(reason), ResponseSchemaMode::Enforce) => {
                error!(schema = schema.id(), status = res.status_code().as_u16(), %reason, "response rejected by schema");
                HttpError::internal("response failed schema validation").into_response()
            }
        }
    }
}

/// Collects `body`, refusing anything over `limit` bytes with `413`.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, HttpError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(HttpError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("body exceeds the {limit} byte limit"),
        )),
        Err(e) => Err(HttpError::bad_request(format!("failed to read request body: {e}"))),
    }
}

fn parse_body(schema: &SchemaDef, body: &[u8]) -> Result<Value, HttpError> {
    if body.is_empty() {
        return Err(HttpError::bad_request("body must not be empty"));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| HttpError::bad_request(format!("body is not valid JSON: {e}")))?;
    schema.validate(&value).map_err(HttpError::validation)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use http_body_util::Full;

    use super::*;
    use crate::hooks::HookError;
    use crate::response::Json;
    use crate::schema::Shape;

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: &str) {
        log.lock().unwrap().push(entry.to_owned());
    }

    fn body_json(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    async fn send(app: &App, method: http::Method, path: &str, body: &str) -> Response {
        app.handle(&method, path, HeaderMap::new(), Full::new(Bytes::from(body.to_owned()))).await
    }

    /// Records every phase for a grouped route and an ungrouped one.
    async fn traced_app(log: &Log) -> App {
        let mut b = AppBuilder::new();
        b.schema(SchemaDef::new("thing", Shape::object().property("name", Shape::string()).required(["name"])))
            .unwrap();
        for phase in [Phase::OnRequest, Phase::PreHandler, Phase::OnResponse] {
            let l = Arc::clone(log);
            b.hook(phase, move |_ctx| {
                push(&l, &format!("global:{phase}"));
                Box::pin(async { Ok(()) })
            });
        }

        let l = Arc::clone(log);
        b.get("/", RouteDef::new(move |_req: Request| {
            push(&l, "handler:/");
            async { "root" }
        }))
        .unwrap();

        let mut g = b.group("/things").unwrap();
        for phase in [Phase::OnRequest, Phase::PreHandler, Phase::OnResponse] {
            let l = Arc::clone(log);
            g.hook(phase, move |_ctx| {
                push(&l, &format!("group:{phase}"));
                Box::pin(async { Ok(()) })
            });
        }
        let (l1, l2) = (Arc::clone(log), Arc::clone(log));
        g.post(
            "/",
            RouteDef::new(move |_req: Request| {
                push(&l1, "handler:/things/");
                async { StatusCode::CREATED }
            })
            .body_schema("thing")
            .pre_handler(move |_ctx| {
                push(&l2, "route:preHandler");
                Box::pin(async { Ok(()) })
            }),
        )
        .unwrap();

        b.build().await.unwrap()
    }

    #[tokio::test]
    async fn grouped_route_runs_every_phase_in_order() {
        let log: Log = Arc::default();
        let app = traced_app(&log).await;

        let res = send(&app, http::Method::POST, "/things/", r#"{"name":"x"}"#).await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(
            *log.lock().unwrap(),
            [
                "global:onRequest",
                "group:onRequest",
                "global:preHandler",
                "group:preHandler",
                "route:preHandler",
                "handler:/things/",
                "global:onResponse",
                "group:onResponse",
            ]
        );
    }

    #[tokio::test]
    async fn ungrouped_route_sees_only_global_hooks() {
        let log: Log = Arc::default();
        let app = traced_app(&log).await;

        let res = send(&app, http::Method::GET, "/", "").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(
            *log.lock().unwrap(),
            ["global:onRequest", "global:preHandler", "handler:/", "global:onResponse"]
        );
    }

    #[tokio::test]
    async fn invalid_body_skips_pre_handlers_and_handler() {
        let log: Log = Arc::default();
        let app = traced_app(&log).await;

        let res = send(&app, http::Method::POST, "/things/", r#"{"nome":"x"}"#).await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&res)["details"][0]["path"], "/name");
        assert_eq!(
            *log.lock().unwrap(),
            ["global:onRequest", "group:onRequest", "global:onResponse", "group:onResponse"]
        );
    }

    #[tokio::test]
    async fn malformed_and_empty_bodies_are_bad_requests() {
        let log: Log = Arc::default();
        let app = traced_app(&log).await;

        for body in ["", "{not json", "[1,2]"] {
            let res = send(&app, http::Method::POST, "/things/", body).await;
            assert_eq!(res.status_code(), StatusCode::BAD_REQUEST, "body {body:?}");
        }
        assert!(!log.lock().unwrap().iter().any(|e| e.starts_with("handler")));
    }

    #[tokio::test]
    async fn unmatched_requests_run_global_hooks_only() {
        let log: Log = Arc::default();
        let app = traced_app(&log).await;

        let res = send(&app, http::Method::GET, "/nope", "").await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(&res)["message"], "Route GET:/nope not found");
        assert_eq!(*log.lock().unwrap(), ["global:onRequest", "global:onResponse"]);
    }

    #[tokio::test]
    async fn unknown_method_is_405() {
        let app = AppBuilder::new().build().await.unwrap();
        let purge = http::Method::from_bytes(b"PURGE").unwrap();
        let res = send(&app, purge, "/", "").await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn failing_hook_is_500_and_handler_never_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_status: Arc<Mutex<Option<StatusCode>>> = Arc::default();

        let mut b = AppBuilder::new();
        b.hook(Phase::PreHandler, |_ctx| Box::pin(async { Err(HookError::new("no session")) }));
        let s = Arc::clone(&seen_status);
        b.hook(Phase::OnResponse, move |ctx| {
            *s.lock().unwrap() = ctx.status();
            Box::pin(async { Ok(()) })
        });
        let c = Arc::clone(&calls);
        b.get("/", RouteDef::new(move |_req: Request| {
            c.fetch_add(1, Ordering::SeqCst);
            async { "unreachable" }
        }))
        .unwrap();
        let app = b.build().await.unwrap();

        let res = send(&app, http::Method::GET, "/", "").await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(&res)["message"], "no session");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*seen_status.lock().unwrap(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn failing_on_response_hook_keeps_the_response() {
        let mut b = AppBuilder::new();
        b.hook(Phase::OnResponse, |_ctx| Box::pin(async { Err(HookError::new("late")) }));
        b.get("/", RouteDef::new(|_req: Request| async { "fine" })).unwrap();
        let app = b.build().await.unwrap();

        let res = send(&app, http::Method::GET, "/", "").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"fine");
    }

    #[tokio::test]
    async fn handler_sees_context_from_pre_handlers() {
        let mut b = AppBuilder::new();
        b.hook(Phase::PreHandler, |ctx| {
            ctx.user.name = "John Doe".into();
            ctx.user.age = 30;
            Box::pin(async { Ok(()) })
        });
        b.get("/me", RouteDef::new(|req: Request| async move { Json(req.user().clone()) })).unwrap();
        let app = b.build().await.unwrap();

        let res = send(&app, http::Method::GET, "/me", "").await;
        assert_eq!(body_json(&res), json!({ "name": "John Doe", "age": 30 }));
        assert_eq!(res.headers()["x-request-id"], "req-1");
    }

    #[tokio::test]
    async fn oversized_body_still_runs_global_hooks() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut b = AppBuilder::new();
        b.body_limit(16);
        for phase in [Phase::OnRequest, Phase::OnResponse] {
            let seen = Arc::clone(&seen);
            b.hook(phase, move |_ctx| {
                seen.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(()) })
            });
        }
        let handled = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&handled);
        b.post("/echo", RouteDef::new(move |_req: Request| {
            h.fetch_add(1, Ordering::SeqCst);
            async { "ok" }
        }))
        .unwrap();
        let app = b.build().await.unwrap();

        let res = send(&app, http::Method::POST, "/echo", &"x".repeat(64)).await;
        assert_eq!(res.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(&res)["statusCode"], 413);
        assert!(res.headers().contains_key("x-request-id"));

        let res = send(&app, http::Method::POST, "/echo", "ok").await;
        assert_eq!(res.status_code(), StatusCode::OK);

        assert_eq!(seen.load(Ordering::SeqCst), 4);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn head_is_served_by_the_get_route() {
        let mut b = AppBuilder::new();
        b.get("/", RouteDef::new(|_req: Request| async { Json(json!({ "message": "Hello World" })) }))
            .unwrap();
        let app = b.build().await.unwrap();

        let res = send(&app, http::Method::HEAD, "/", "").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.is_json());
        assert!(res.body().is_empty());

        let res = send(&app, http::Method::HEAD, "/missing", "").await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert!(res.body().is_empty());
    }

    #[tokio::test]
    async fn context_keeps_defaults_without_pre_handlers() {
        let mut b = AppBuilder::new();
        b.get("/me", RouteDef::new(|req: Request| async move { Json(req.user().clone()) })).unwrap();
        let app = b.build().await.unwrap();

        let res = send(&app, http::Method::GET, "/me", "").await;
        assert_eq!(body_json(&res), json!({ "name": "", "age": 0 }));
    }

    #[tokio::test]
    async fn group_prefix_is_joined_and_duplicates_rejected() {
        let mut b = AppBuilder::new();
        b.group("/api/users/").unwrap().get("/", RouteDef::new(|_req: Request| async { "a" })).unwrap();
        let err = b
            .route(Method::Get, "/api/users/", RouteDef::new(|_req: Request| async { "b" }))
            .err()
            .unwrap();
        assert!(matches!(err, Error::DuplicateRoute { .. }));
        assert!(b.group("api").is_err());

        let app = b.build().await.unwrap();
        let res = send(&app, http::Method::GET, "/api/users/", "").await;
        assert_eq!(res.body(), b"a");
    }

    async fn schema_app(mode: ResponseSchemaMode) -> App {
        let mut b = AppBuilder::new();
        b.response_schemas(mode);
        b.schema(SchemaDef::new("out", Shape::object().property("id", Shape::integer()).required(["id"])))
            .unwrap();
        b.get(
            "/",
            RouteDef::new(|_req: Request| async { Json(json!({ "id": "not a number" })) })
                .response_schema(StatusCode::OK, "out"),
        )
        .unwrap();
        b.build().await.unwrap()
    }

    #[tokio::test]
    async fn response_schema_modes() {
        let warn = schema_app(ResponseSchemaMode::Warn).await;
        assert_eq!(send(&warn, http::Method::GET, "/", "").await.status_code(), StatusCode::OK);

        let off = schema_app(ResponseSchemaMode::Off).await;
        assert_eq!(send(&off, http::Method::GET, "/", "").await.status_code(), StatusCode::OK);

        let enforce = schema_app(ResponseSchemaMode::Enforce).await;
        assert_eq!(
            send(&enforce, http::Method::GET, "/", "").await.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn failing_connector_aborts_build() {
        use crate::connector::{ConnectError, ConnectFuture};

        struct Down;
        impl Connector for Down {
            fn name(&self) -> &str { "down" }
            fn connect(&self) -> ConnectFuture<'_> {
                Box::pin(async {
                    Err(ConnectError { name: "down".into(), message: "refused".into() })
                })
            }
        }

        let mut b = AppBuilder::new();
        b.connector(Down);
        assert!(matches!(b.build().await, Err(Error::Connect(_))));
    }
}
