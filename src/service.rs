//! The lintel service: a greeting at `/` and user creation under
//! `/api/users`.
//!
//! | Route | Body | Success |
//! |---|---|---|
//! | `GET /` | none | `200 {"message":"Hello World"}` |
//! | `POST /api/users/` | `userSchema` | `201 {"message":"User created","jwt":…,"verified":{"name":…}}` |
//!
//! Hooks registered here:
//! - global `preHandler`: resolves the caller as John Doe, 30
//! - global `onRequest` / `onResponse`: request and timing logs
//! - `/api/users` `onRequest` / `onResponse`: scoped logs for the group
//! - `POST /api/users/` route `preHandler`: a trace line

use std::sync::Arc;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::app::{App, AppBuilder};
use crate::config::Config;
use crate::connector::NoopConnector;
use crate::context::{RequestContext, User};
use crate::error::Error;
use crate::handler::Handler;
use crate::hooks::{self, HookFuture, Phase};
use crate::request::Request;
use crate::response::{HttpError, Json};
use crate::router::RouteDef;
use crate::schema::SchemaDef;
use crate::tokens::{TokenService, VerifiedToken};

pub const USER_SCHEMA: &str = "userSchema";
pub const USER_CREATED_SCHEMA: &str = "userCreated";

/// Body of `POST /api/users/`.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub age: Option<f64>,
    pub test: Option<bool>,
}

#[derive(Serialize)]
struct Greeting {
    message: &'static str,
}

#[derive(Serialize)]
struct UserCreated {
    message: &'static str,
    jwt: String,
    verified: VerifiedToken,
}

/// Builds the service with every route, schema, hook and connector, and
/// awaits startup.
pub async fn build(config: &Config, tokens: Arc<dyn TokenService>) -> Result<App, Error> {
    let mut app = AppBuilder::new();
    app.body_limit(config.body_limit)
        .response_schemas(config.response_schemas);
    register(&mut app, tokens)?;
    app.build().await
}

/// Registers the service's schemas, routes, hooks and connector on `app`.
pub fn register(app: &mut AppBuilder, tokens: Arc<dyn TokenService>) -> Result<(), Error> {
    app.schema(user_schema()?)?
        .schema(user_created_schema()?)?;

    app.get("/", RouteDef::new(hello))?;

    app.hook(Phase::PreHandler, resolve_user);

    let mut users = app.group("/api/users")?;
    users
        .hook(Phase::OnRequest, |_ctx| {
            info!("onRequest: scoped for user routes");
            hooks::done()
        })
        .hook(Phase::OnResponse, |_ctx| {
            info!("onResponse: scoped for user routes");
            hooks::done()
        });
    users.post(
        "/",
        RouteDef::new(create_user(tokens))
            .body_schema(USER_SCHEMA)
            .response_schema(StatusCode::CREATED, USER_CREATED_SCHEMA)
            .pre_handler(|_ctx| {
                info!("pre-handler for user creation");
                hooks::done()
            }),
    )?;
    info!("user routes registered");

    app.connector(NoopConnector);

    app.hook(Phase::OnRequest, |_ctx| {
        info!("request received");
        hooks::done()
    })
    .hook(Phase::OnResponse, |ctx| {
        info!(
            status = ctx.status().map(|s| s.as_u16()),
            elapsed_ms = ctx.elapsed().as_secs_f64() * 1000.0,
            "response sent"
        );
        hooks::done()
    });

    Ok(())
}

/// Global `preHandler`: every caller is John Doe, 30.
pub fn resolve_user(ctx: &mut RequestContext) -> HookFuture<'_> {
    ctx.user = User { name: "John Doe".to_owned(), age: 30 };
    hooks::done()
}

pub fn user_schema() -> Result<SchemaDef, Error> {
    SchemaDef::from_json(&json!({
        "$id": USER_SCHEMA,
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": { "type": "string" },
            "age":  { "type": "number" },
            "test": { "type": "boolean", "nullable": true }
        }
    }))
}

pub fn user_created_schema() -> Result<SchemaDef, Error> {
    SchemaDef::from_json(&json!({
        "$id": USER_CREATED_SCHEMA,
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "jwt": { "type": "string" },
            "verified": {
                "type": "object",
                "properties": { "name": { "type": "string" } }
            }
        }
    }))
}

async fn hello(_req: Request) -> Json<Greeting> {
    Json(Greeting { message: "Hello World" })
}

fn create_user(tokens: Arc<dyn TokenService>) -> impl Handler {
    move |req: Request| {
        let tokens = Arc::clone(&tokens);
        async move {
            let body: CreateUser = req
                .json()
                .map_err(|e| HttpError::bad_request(e.to_string()))?;
            debug!(?body, user = ?req.user(), "creating user");

            let jwt = tokens.sign();
            let verified = tokens
                .verify(&jwt)
                .map_err(|e| HttpError::new(StatusCode::UNAUTHORIZED, e.to_string()))?;

            Ok::<_, HttpError>((
                StatusCode::CREATED,
                Json(UserCreated { message: "User created", jwt, verified }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn resolve_user_replaces_the_default_caller() {
        let mut ctx = RequestContext::new(1, None, "/api/users/");
        assert_eq!(ctx.user, User::default());

        resolve_user(&mut ctx).await.unwrap();
        assert_eq!(ctx.user, User { name: "John Doe".to_owned(), age: 30 });
    }

    #[test]
    fn user_schema_accepts_null_test_flag() {
        let schema = user_schema().unwrap();
        assert!(schema.validate(&json!({ "name": "Ann", "test": null })).is_ok());
        assert!(schema.validate(&json!({ "name": "Ann", "age": "x" })).is_err());
    }

    #[test]
    fn created_schema_matches_handler_output() {
        let schema = user_created_schema().unwrap();
        let body = json!({ "message": "User created", "jwt": "signed-jwt", "verified": { "name": "Tom" } });
        assert!(schema.validate(&body).is_ok());
    }
}
