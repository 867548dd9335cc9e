//! services/portal/src/bin/portal.rs

use clap::Parser;
use portal_lib::cli::{self, Cli};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shown when the command itself panicked.
const CRASH_MESSAGE: &str =
    "Something broke in the app. Run again with RUST_LOG=debug and include the log when reporting it.";

#[tokio::main]
async fn main() -> ExitCode {
    // --- 1. Load Configuration & Set Up Logging ---
    let cli = Cli::parse();
    let config = match cli::load_config(&cli) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("{}", e.user_message());
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    debug!(api_url = %config.api_url, "Configuration loaded");

    // --- 2. Run the command behind a failure boundary ---
    match tokio::spawn(cli::run(cli, config)).await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Command aborted: {}", e);
            eprintln!("{}", CRASH_MESSAGE);
            ExitCode::FAILURE
        }
    }
}
