//! Unified error type.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::method::Method;

/// Result alias for lintel's fallible startup and shutdown operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by lintel's fallible operations.
///
/// Application-level errors (404, 400, 500 from a failing hook) are
/// expressed as HTTP [`Response`](crate::Response) values, not as `Error`s.
/// This type surfaces registration mistakes, which are caught at startup,
/// and infrastructure failures: binding the port, connecting a backing
/// store, or draining connections on shutdown.
#[derive(Debug, Error)]
pub enum Error {
    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    #[error("invalid route path `{path}`: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("schema `{id}` is already registered")]
    DuplicateSchema { id: String },

    #[error("schema `{id}` is not registered")]
    UnknownSchema { id: String },

    #[error("invalid schema `{id}`: {reason}")]
    InvalidSchema { id: String, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("connector failed during startup: {0}")]
    Connect(#[from] crate::connector::ConnectError),

    #[error("shutdown did not complete: {0}")]
    Shutdown(ShutdownError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a graceful close failed.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("{remaining} connection(s) still open after {timeout:?}")]
    DrainTimeout { remaining: usize, timeout: Duration },

    #[error("connection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_route_names_method_and_path() {
        let err = Error::DuplicateRoute { method: Method::Post, path: "/api/users/".into() };
        assert_eq!(err.to_string(), "route POST /api/users/ is already registered");
    }

    #[test]
    fn bind_error_keeps_io_source() {
        let err = Error::Bind {
            addr: "0.0.0.0:3000".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:3000"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn drain_timeout_reports_open_connections() {
        let err = Error::Shutdown(ShutdownError::DrainTimeout {
            remaining: 2,
            timeout: Duration::from_secs(5),
        });
        assert!(err.to_string().contains("2 connection(s)"));
    }
}
