//! swe-playground binary.

use std::process::ExitCode;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps HTTP client chatter out of the default output.
const QUIET_DEPENDENCIES: &str = "hyper=warn,reqwest=warn,tera=warn";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = swe_playground::cli::parse_cli();

    // RUST_LOG wins over --log-level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},{}", cli.log_level, QUIET_DEPENDENCIES))
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match swe_playground::cli::run_with_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
