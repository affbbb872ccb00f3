//! voxel-migrate entry point.
//!
//! Exits with 0 when the command completed and 1 on any unhandled error,
//! which is what the orchestrator checks for each step.
use clap::Parser;
use dotenv::dotenv;
use std::process::ExitCode;
use tracing::error;
use voxel_migrate::cli::Cli;
use voxel_migrate::commands;
use voxel_migrate::logging::{LogContext, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    let tunables = match commands::tunables(&cli) {
        Ok(tunables) => tunables,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let target = match commands::log_target(&cli.command) {
        Ok(target) => target,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let _logging = match LogContext::init(&tunables.log_root, target.as_ref(), LogFormat::from_env()) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match commands::execute(cli.command, tunables).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "voxel-migrate failed");
            ExitCode::FAILURE
        }
    }
}
