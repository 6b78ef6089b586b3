//! # lintel
//!
//! A small HTTP framework built around three request phases:
//!
//! - **onRequest**: runs first, for every request, before any routing
//!   decision is visible to handlers
//! - **preHandler**: runs after routing and body validation, right before
//!   the handler; this is where the caller's identity is attached
//! - **onResponse**: runs last, once the status is final, even when an
//!   earlier phase failed
//!
//! Hooks are registered globally or against a route group, and run global
//! first, then group, then route. Request bodies are checked against
//! registered schemas before any preHandler sees them, and a body that
//! fails never reaches the handler.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lintel::{hooks, AppBuilder, Json, Phase, Request, RouteDef, Server};
//!
//! #[tokio::main]
//! async fn main() -> lintel::Result<()> {
//!     let mut app = AppBuilder::new();
//!     app.hook(Phase::PreHandler, |ctx| {
//!         ctx.user.name = "John Doe".to_owned();
//!         hooks::done()
//!     });
//!     app.get("/", RouteDef::new(hello))?;
//!
//!     let app = app.build().await?;
//!     Server::new(([127, 0, 0, 1], 3000).into()).serve(app).await
//! }
//!
//! async fn hello(req: Request) -> Json<serde_json::Value> {
//!     Json(serde_json::json!({ "hello": req.user().name }))
//! }
//! ```

mod app;
mod config;
mod connector;
mod context;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod schema;
mod server;
mod tokens;

pub mod hooks;
pub mod service;
pub mod telemetry;

pub use app::{App, AppBuilder, DEFAULT_BODY_LIMIT, Group, ResponseSchemaMode};
pub use config::Config;
pub use connector::{ConnectError, ConnectFuture, Connector, NoopConnector};
pub use context::{RequestContext, User};
pub use error::{Error, Result, ShutdownError};
pub use handler::Handler;
pub use hooks::{BoxedHook, GroupId, HookError, HookFuture, HookPipeline, Phase, Scope};
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{HttpError, IntoResponse, Json, Response, ResponseBuilder};
pub use router::RouteDef;
pub use schema::{FieldError, Rule, SchemaDef, SchemaError, SchemaRegistry, Shape, ValidationErrors};
pub use server::{Server, ServerState};
pub use tokens::{StubTokens, TokenError, TokenService, VerifiedToken};
