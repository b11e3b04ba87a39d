//! Operator command line for the hub.
//!
//! User-facing output is JSON written to stdout with `writeln!`; logs go to
//! stderr.

pub mod config_cmd;
pub mod device_cmd;
pub mod user_cmd;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use patio_core::config::{Config, Secret, default_database_path};
use serde::Serialize;
use tracing::info;

use crate::error::Error;
use crate::storage::HubDatabase;

/// Environment variable holding the token signing key.
pub const JWT_SECRET_ENV: &str = "PATIO_JWT_SECRET";
/// Environment variable holding the broker password.
pub const AMQP_PASSWORD_ENV: &str = "PATIO_AMQP_PASSWORD";

/// Patio device hub.
#[derive(Debug, Parser)]
#[command(
    name = "patio-hub",
    version,
    about = "Patio device hub - device registry, config sync and user accounts"
)]
pub struct Cli {
    /// JSON config file layered over the global settings.
    #[arg(long, global = true, env = "PATIO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register, inspect and remove devices.
    #[command(subcommand)]
    Device(device_cmd::DeviceAction),
    /// Read or change a device's schedule.
    #[command(subcommand)]
    Config(config_cmd::ConfigAction),
    /// Manage user accounts and sessions.
    #[command(subcommand)]
    User(user_cmd::UserAction),
}

impl Cli {
    /// Fold command-line flags into the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.db_path {
            config.database.path = Some(path.clone());
        }
        if self.log_json {
            config.log.json = true;
        }
    }
}

/// Execute a command against the configured store.
pub async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let db = open_database(config).await?;
    match command {
        Command::Device(action) => device_cmd::run(action, db).await,
        Command::Config(action) => config_cmd::run(action, db, config).await,
        Command::User(action) => user_cmd::run(action, db, config).await,
    }
}

/// Process exit code for a failed command.
///
/// Out-of-sync devices get their own code so wrappers can page someone.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::OutOfSync { .. }) => 3,
        Some(Error::InvalidInput(_)) => 2,
        _ => 1,
    }
}

async fn open_database(config: &Config) -> anyhow::Result<HubDatabase> {
    let path = match &config.database.path {
        Some(path) => path.clone(),
        None => default_database_path()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?,
    };
    info!(path = %path.display(), "Opening hub database");
    Ok(HubDatabase::open(&path).await?)
}

pub(crate) fn resolve_secret(name: &str) -> anyhow::Result<Secret> {
    Secret::resolve(name).with_context(|| format!("Set {name} or {name}_FILE"))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = io::stdout();
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_fold_into_config() {
        let cli = Cli::try_parse_from([
            "patio-hub",
            "device",
            "get",
            "45-36-17-E3-1C-70",
            "--db-path",
            "/tmp/hub.db",
            "--log-json",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/hub.db")));
        assert!(config.log.json);
    }

    #[test]
    fn exit_codes() {
        let oos = anyhow::Error::new(Error::OutOfSync {
            device: "d".into(),
            cause: "n".into(),
            revert: "r".into(),
        });
        assert_eq!(exit_code(&oos), 3);
        assert_eq!(exit_code(&Error::InvalidInput("x".into()).into()), 2);
        assert_eq!(exit_code(&Error::NotFound("x".into()).into()), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
