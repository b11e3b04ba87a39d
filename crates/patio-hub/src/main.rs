//! Patio Hub
//!
//! Operator command line for the device registry, schedule sync and user
//! accounts.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use patio_core::config::load_config;
use patio_core::tracing_init::init_tracing;
use patio_hub::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();

    let mut config = load_config(args.config.as_deref())?;
    args.apply_to(&mut config);
    init_tracing("patio_hub", &config.log);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting patio-hub");

    match cli::run(args.command, &config).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Command failed");
            writeln!(io::stderr(), "Error: {e:#}")?;
            Ok(ExitCode::from(cli::exit_code(&e)))
        }
    }
}
