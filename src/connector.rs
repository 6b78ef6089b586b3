//! Backing-store connectors awaited during startup.
//!
//! The service has no persistence yet. [`NoopConnector`] stands in for the
//! database connection so startup already has the shape a real one needs:
//! every connector is awaited before the server starts listening, and a
//! failure aborts startup.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("{name}: {message}")]
pub struct ConnectError {
    pub name: String,
    pub message: String,
}

pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ConnectError>> + Send + 'a>>;

pub trait Connector: Send + Sync + 'static {
    /// Shown in startup logs.
    fn name(&self) -> &str;

    fn connect(&self) -> ConnectFuture<'_>;
}

/// Connects to nothing.
#[derive(Clone, Debug, Default)]
pub struct NoopConnector;

impl Connector for NoopConnector {
    fn name(&self) -> &str {
        "database"
    }

    fn connect(&self) -> ConnectFuture<'_> {
        Box::pin(async {
            info!("connected to database (no-op)");
            Ok(())
        })
    }
}
