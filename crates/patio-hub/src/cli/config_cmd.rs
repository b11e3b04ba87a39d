//! Schedule subcommands: get, set.

use patio_core::config::Config;

use crate::devices::DeviceRegistry;
use crate::notify::RabbitPublisher;
use crate::schedule::Configuration;
use crate::storage::HubDatabase;
use crate::sync::{ConfigSync, SyncPolicy};

use super::{AMQP_PASSWORD_ENV, print_json, resolve_secret};

/// Schedule subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Show a device's schedule.
    Get { identifier: String },
    /// Replace a device's schedule and push it to the device.
    Set {
        identifier: String,
        /// Schedule type: 0 tick-every, 1 pulse-every, 2 pulse-every-day-at,
        /// 3 tick-every-day-at.
        #[arg(long = "type")]
        schedule: i64,
        /// Clock time for the daily schedules.
        #[arg(long, default_value = "")]
        tickat: String,
        /// Pulse length in seconds.
        #[arg(long, default_value_t = 0)]
        pulsegap: i64,
        /// Period in seconds.
        #[arg(long, default_value_t = 0)]
        interval: i64,
    },
}

/// Execute a schedule subcommand.
///
/// Reading needs only the store; changing a schedule also needs the broker
/// password.
pub async fn run(action: ConfigAction, db: HubDatabase, config: &Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { identifier } => {
            print_json(&DeviceRegistry::new(db).get_config(&identifier).await?)
        }
        ConfigAction::Set {
            identifier,
            schedule,
            tickat,
            pulsegap,
            interval,
        } => {
            let password = resolve_secret(AMQP_PASSWORD_ENV)?;
            let publisher = RabbitPublisher::new(&config.amqp, password)?;
            let sync = ConfigSync::new(
                db,
                publisher,
                config.amqp.queue.clone(),
                SyncPolicy::from(&config.sync),
            );
            let schedule = Configuration {
                config: schedule,
                tickat,
                pulsegap,
                interval,
            };
            print_json(&sync.update_config(&identifier, &schedule).await?)
        }
    }
}
