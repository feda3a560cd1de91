//! Standalone `nuget-store` CLI binary

use clap::Parser;
use nuget_store::cli::{self, AlreadyReported, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Flushes file logs on exit
    let _log_guard = nuget_logging::init_subscriber();

    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is::<AlreadyReported>() => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
