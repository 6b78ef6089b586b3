//! Request-lifecycle hooks.
//!
//! Every request walks three phases in a fixed order:
//!
//! ```text
//! onRequest ──▶ (body validation) ──▶ preHandler ──▶ handler ──▶ onResponse
//! ```
//!
//! A hook is registered against one [`Phase`] and one [`Scope`]. When a phase
//! runs for a request, the [`HookPipeline`] calls every global hook of that
//! phase in registration order, then every hook scoped to the request's
//! route group, also in registration order. Hooks run one after another,
//! never concurrently, and each one is awaited before the next starts.
//!
//! # Writing a hook
//!
//! A hook borrows the [`RequestContext`] mutably for the duration of its
//! future, so it is written as a closure returning a boxed future:
//!
//! ```rust
//! use lintel::{HookFuture, RequestContext};
//!
//! fn set_user(ctx: &mut RequestContext) -> HookFuture<'_> {
//!     Box::pin(async move {
//!         ctx.user.name = "John Doe".into();
//!         Ok(())
//!     })
//! }
//! ```
//!
//! Returning `Err(HookError)` stops the phase: later hooks, and the handler,
//! are skipped and the request is answered with `500`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::context::RequestContext;

/// A lifecycle phase.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
    /// Before routing details and body validation.
    OnRequest,
    /// After validation, before the handler.
    PreHandler,
    /// After the response is finalised, before it is flushed.
    OnResponse,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OnRequest  => "onRequest",
            Self::PreHandler => "preHandler",
            Self::OnResponse => "onResponse",
        })
    }
}

/// Identifies a route group. Two groups are the same group iff their
/// prefixes are equal.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GroupId(Arc<str>);

impl GroupId {
    pub fn new(prefix: &str) -> Self {
        Self(Arc::from(prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which requests a hook sees.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Scope {
    Global,
    Group(GroupId),
}

/// A hook failed. The message ends up in the `500` response body.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The future a hook returns. It may borrow the context it was given.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HookError>> + Send + 'a>>;

/// A type-erased hook, shared by every request that reaches it.
pub type BoxedHook =
    Arc<dyn for<'a> Fn(&'a mut RequestContext) -> HookFuture<'a> + Send + Sync + 'static>;

/// Erases a hook closure.
///
/// The `for<'a>` bound sits on the function itself so that closures passed
/// here get a higher-ranked signature inferred.
pub fn hook<F>(f: F) -> BoxedHook
where
    F: for<'a> Fn(&'a mut RequestContext) -> HookFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An already-completed hook future, for hooks that finish synchronously.
pub fn done<'a>() -> HookFuture<'a> {
    Box::pin(std::future::ready(Ok(())))
}

struct HookEntry {
    phase: Phase,
    scope: Scope,
    hook: BoxedHook,
}

/// Ordered hook registrations for all phases and scopes.
#[derive(Default)]
pub struct HookPipeline {
    entries: Vec<HookEntry>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `hook` to the end of `phase` for `scope`.
    pub fn register(&mut self, phase: Phase, scope: Scope, hook: BoxedHook) {
        self.entries.push(HookEntry { phase, scope, hook });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The hooks `phase` would run for a request in `group`, in call order.
    fn selected<'s>(
        &'s self,
        phase: Phase,
        group: Option<&'s GroupId>,
    ) -> impl Iterator<Item = &'s BoxedHook> + 's {
        let globals = self
            .entries
            .iter()
            .filter(move |e| e.phase == phase && e.scope == Scope::Global);
        let scoped = self.entries.iter().filter(move |e| {
            e.phase == phase && matches!((&e.scope, group), (Scope::Group(g), Some(want)) if g == want)
        });
        globals.chain(scoped).map(|e| &e.hook)
    }

    /// Runs `phase` for one request.
    ///
    /// # Errors
    ///
    /// The first [`HookError`]. Hooks after the failing one do not run.
    pub async fn run(
        &self,
        phase: Phase,
        group: Option<&GroupId>,
        ctx: &mut RequestContext,
    ) -> Result<(), HookError> {
        run_all(self.selected(phase, group), phase, ctx).await
    }
}

/// Awaits each hook in turn, stopping at the first failure.
pub(crate) async fn run_all<'h>(
    hooks: impl Iterator<Item = &'h BoxedHook>,
    phase: Phase,
    ctx: &mut RequestContext,
) -> Result<(), HookError> {
    for (index, hook) in hooks.enumerate() {
        if let Err(e) = hook(&mut *ctx).await {
            warn!(%phase, index, error = %e, "hook failed");
            return Err(e);
        }
    }
    Ok(())
}
