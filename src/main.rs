//! RAX Store Server - Entry Point
//!
//! Authenticated per-user file storage over a length-prefixed binary protocol.

use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;

use rax_store::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default filter
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Launching RAX Store server...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        _ = server.start() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested, stopping server"),
    }

    ExitCode::SUCCESS
}
