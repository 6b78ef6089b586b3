//! HTTP server and graceful shutdown.
//!
//! # Lifecycle
//!
//! ```text
//! Unstarted ──listen()──▶ Listening ──signal──▶ Draining ──▶ Stopped
//! ```
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Stops calling `listener.accept()` and drops the listener, so no new
//!    connections are made.
//! 2. Tells every open connection to finish its in-flight request and then
//!    close, instead of waiting for the next keep-alive request.
//! 3. Waits for those connections, up to the drain timeout.
//! 4. Returns from [`Server::serve`]: `Ok` after a clean drain,
//!    [`Error::Shutdown`] if the timeout expired first.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::error::{Error, ShutdownError};

/// Where the server is in its single-shot lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerState {
    Unstarted,
    Listening,
    Draining,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unstarted => "unstarted",
            Self::Listening => "listening",
            Self::Draining  => "draining",
            Self::Stopped   => "stopped",
        })
    }
}

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    listener: Option<TcpListener>,
    drain_timeout: Option<Duration>,
    state: watch::Sender<ServerState>,
}

impl Server {
    /// A server that will bind `addr`. Nothing happens until
    /// [`listen`](Server::listen) or [`serve`](Server::serve).
    pub fn new(addr: SocketAddr) -> Self {
        let (state, _) = watch::channel(ServerState::Unstarted);
        Self { addr, listener: None, drain_timeout: Some(Duration::from_secs(30)), state }
    }

    /// How long to wait for in-flight requests after a shutdown signal.
    /// `None` waits indefinitely.
    pub fn drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Observes lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Binds the listening socket. Returns the bound address, which differs
    /// from the configured one when port `0` was requested.
    ///
    /// # Errors
    ///
    /// [`Error::Bind`] when the socket cannot be acquired. Not retried.
    pub async fn listen(&mut self) -> Result<SocketAddr, Error> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| Error::Bind { addr: self.addr, source })?;
        let local = listener.local_addr()?;
        self.listener = Some(listener);
        self.state.send_replace(ServerState::Listening);
        info!(addr = %local, "lintel listening");
        Ok(local)
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains.
    pub async fn serve_with_shutdown<S>(mut self, app: App, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        self.listen().await?;
        let Some(listener) = self.listener.take() else {
            return Err(Error::Io(std::io::Error::other("listener was not bound")));
        };

        let builder = ConnBuilder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut tasks = JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown wins over queued connections.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = app.clone();
                    let svc = service_fn(move |req| {
                        let app = app.clone();
                        async move { dispatch(app, req).await }
                    });

                    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), svc);
                    let conn = graceful.watch(conn.into_owned());
                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            debug!(%peer, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        self.state.send_replace(ServerState::Draining);

        let result = self.drain(graceful, &mut tasks).await;
        self.state.send_replace(ServerState::Stopped);
        match &result {
            Ok(()) => info!("lintel stopped"),
            Err(e) => error!(error = %e, "lintel stopped uncleanly"),
        }
        result
    }

    async fn drain(&self, graceful: GracefulShutdown, tasks: &mut JoinSet<()>) -> Result<(), Error> {
        let wait = async {
            graceful.shutdown().await;
            while let Some(res) = tasks.join_next().await {
                res?;
            }
            Ok::<_, tokio::task::JoinError>(())
        };

        let outcome = match self.drain_timeout {
            None => wait.await,
            Some(timeout) => {
                let res = tokio::time::timeout(timeout, wait).await;
                let Ok(done) = res else {
                    let remaining = tasks.len();
                    warn!(remaining, ?timeout, "drain timeout expired, aborting connections");
                    tasks.shutdown().await;
                    return Err(Error::Shutdown(ShutdownError::DrainTimeout { remaining, timeout }));
                };
                done
            }
        };
        outcome.map_err(|e| Error::Shutdown(ShutdownError::Task(e)))
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Hands one request to the app. The body is passed on unread; the app
/// collects it under its own body limit.
///
/// The error type is [`Infallible`]: every failure becomes an HTTP status,
/// so hyper never sees an error.
async fn dispatch(
    app: App,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let response = app.handle(&parts.method, parts.uri.path(), parts.headers, body).await;
    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGINT (Ctrl-C) or SIGTERM. On non-Unix platforms
/// only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => info!(signal = "SIGINT", "received signal, shutting down"),
        () = sigterm => info!(signal = "SIGTERM", "received signal, shutting down"),
    }
}
