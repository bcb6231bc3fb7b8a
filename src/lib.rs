mod commands;
pub mod core;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use commands::Cli;

pub fn run() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,packsmith_lib=debug")),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!("Packsmith starting: {:?}", cli);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Could not start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(commands::execute(cli))
}
