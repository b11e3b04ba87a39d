//! User subcommands: create, edit, delete, find, login, verify.

use std::sync::Arc;

use patio_core::config::Config;

use crate::auth::{JwtManager, NewUser, UserPatch, UserService};
use crate::storage::HubDatabase;

use super::{JWT_SECRET_ENV, print_json, resolve_secret};

/// User subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum UserAction {
    /// Create a guest account.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PATIO_USER_PASSWORD", hide_env_values = true)]
        password: String,
        /// Telegram chat id for alerts.
        #[arg(long, default_value_t = 0)]
        telegid: i64,
    },
    /// Change name, password or telegram id. Email cannot change.
    Edit {
        identifier: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        telegid: Option<i64>,
    },
    /// Permanently remove an account.
    Delete { identifier: String },
    /// Show an account by email or id.
    Find { identifier: String },
    /// Check credentials and print a session token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PATIO_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Verify a session token and print its claims.
    Verify { token: String },
}

impl UserAction {
    const fn needs_tokens(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Verify { .. })
    }
}

/// Execute a user subcommand.
///
/// Only `login` and `verify` need the token signing secret.
pub async fn run(action: UserAction, db: HubDatabase, config: &Config) -> anyhow::Result<()> {
    let users = if action.needs_tokens() {
        let secret = resolve_secret(JWT_SECRET_ENV)?;
        let jwt = JwtManager::new(secret.expose().as_bytes(), config.auth.token_ttl_secs);
        UserService::new(db).with_tokens(Arc::new(jwt))
    } else {
        UserService::new(db)
    };

    match action {
        UserAction::Create {
            name,
            email,
            password,
            telegid,
        } => {
            let user = users
                .create(NewUser {
                    name,
                    email,
                    password,
                    telegid,
                })
                .await?;
            print_json(&user)
        }
        UserAction::Edit {
            identifier,
            name,
            password,
            telegid,
        } => {
            users
                .edit(
                    &identifier,
                    UserPatch {
                        name,
                        password,
                        telegid,
                    },
                )
                .await?;
            print_json(&users.find(&identifier).await?)
        }
        UserAction::Delete { identifier } => {
            users.delete(&identifier).await?;
            print_json(&serde_json::json!({ "removed": identifier }))
        }
        UserAction::Find { identifier } => print_json(&users.find(&identifier).await?),
        UserAction::Login { email, password } => {
            print_json(&users.authenticate(&email, &password).await?)
        }
        UserAction::Verify { token } => print_json(&users.authorize(&token)?),
    }
}
