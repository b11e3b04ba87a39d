//! Device subcommands: register, get, remove, add-users, list.

use crate::devices::{DeviceRegistry, Registration};
use crate::storage::HubDatabase;

use super::print_json;

/// Device subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum DeviceAction {
    /// Register a new device.
    Register {
        /// MAC address, `:` or `-` delimited.
        #[arg(long)]
        mac: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Coordinates or a free-form place.
        #[arg(long, default_value = "")]
        location: String,
        /// Hardware platform.
        #[arg(long, default_value = "")]
        make: String,
        /// Email of a user allowed on the device. Repeatable.
        #[arg(long = "user")]
        users: Vec<String>,
    },
    /// Show a device by MAC or id.
    Get { identifier: String },
    /// Permanently remove a device.
    Remove { identifier: String },
    /// Allow more users on a device.
    AddUsers {
        identifier: String,
        #[arg(required = true)]
        users: Vec<String>,
    },
    /// List the devices a user is allowed on.
    List {
        #[arg(long)]
        user: String,
    },
}

/// Execute a device subcommand.
pub async fn run(action: DeviceAction, db: HubDatabase) -> anyhow::Result<()> {
    let registry = DeviceRegistry::new(db);
    match action {
        DeviceAction::Register {
            mac,
            name,
            location,
            make,
            users,
        } => {
            let device = registry
                .register(Registration {
                    mac,
                    name,
                    location,
                    make,
                    users,
                    config: None,
                })
                .await?;
            print_json(&device)
        }
        DeviceAction::Get { identifier } => print_json(&registry.get(&identifier).await?),
        DeviceAction::Remove { identifier } => {
            registry.unregister(&identifier).await?;
            print_json(&serde_json::json!({ "removed": identifier }))
        }
        DeviceAction::AddUsers { identifier, users } => {
            print_json(&registry.authorize_users(&identifier, &users).await?)
        }
        DeviceAction::List { user } => print_json(&registry.devices_for_user(&user).await?),
    }
}
