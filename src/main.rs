//! `mpd-web-relay` binary.
//!
//! Parses flags, installs logging, then serves until Ctrl-C or a fatal
//! startup error (exit code 1).

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mpd_web_relay::{Cli, Result, Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_filter);

    match run(cli.into_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_startup_error() => {
            error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(config: ServerConfig) -> Result<()> {
    let server = Server::bind(config).await?;

    server
        .serve_with_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C");
            } else {
                // No signal handler available: serve until killed.
                std::future::pending::<()>().await;
            }
        })
        .await
}
