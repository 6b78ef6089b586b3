use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use lintel::{Config, Server, StubTokens, service, telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    telemetry::init(&config.log_level);

    let app = match service::build(&config, Arc::new(StubTokens)).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    let server = Server::new(config.addr()).drain_timeout(config.drain_timeout());
    match server.serve(app).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server exited with an error");
            ExitCode::FAILURE
        }
    }
}
