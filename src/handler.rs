//! Route handlers.
//!
//! A handler is any `Fn(Request) -> impl Future<Output = impl IntoResponse>`.
//! [`RouteDef::new`](crate::RouteDef::new) erases it into an [`Endpoint`]
//! so the route table can hold handlers of different types side by side.
//!
//! Handlers are plain functions of the request. Anything else they need,
//! such as a [`TokenService`](crate::TokenService), is captured when the
//! closure is built:
//!
//! ```rust
//! use std::sync::Arc;
//! use lintel::{Json, Request, RouteDef, StubTokens, TokenService};
//!
//! let tokens: Arc<dyn TokenService> = Arc::new(StubTokens);
//! let route = RouteDef::new(move |_req: Request| {
//!     let jwt = tokens.sign();
//!     async move { Json(serde_json::json!({ "jwt": jwt })) }
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub(crate) type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe face of a handler, as stored in the route table.
#[doc(hidden)]
pub trait Endpoint: Send + Sync + 'static {
    fn call(&self, req: Request) -> ResponseFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn Endpoint>;

/// Satisfied by every async function or closure of the request that
/// returns something [`IntoResponse`]. Sealed.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Erased(self))
    }
}

mod sealed {
    use std::future::Future;

    use crate::request::Request;
    use crate::response::IntoResponse;

    pub trait Sealed {}

    impl<F, Fut, R> Sealed for F
    where
        F: Fn(Request) -> Fut,
        Fut: Future<Output = R>,
        R: IntoResponse,
    {
    }
}

struct Erased<F>(F);

impl<F, Fut, R> Endpoint for Erased<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> ResponseFuture {
        let pending = (self.0)(req);
        Box::pin(async move { pending.await.into_response() })
    }
}
