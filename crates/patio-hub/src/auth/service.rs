//! User account operations: sign-up, edits, login and token checks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::claims::Claims;
use super::jwt::JwtManager;
use super::password;
use super::validation::{is_valid_name, is_valid_password};
use crate::error::{Error, Result};
use crate::identity::{Email, NaturalKey, resolve};
use crate::storage::{HubDatabase, NewUserRecord, Role, User, UserUpdate};

/// Sign-up request. The password is cleartext until hashed in
/// [`UserService::create`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub telegid: i64,
}

/// Changes to an account. `None` leaves a field untouched; `Some` is
/// validated and written. Email cannot be changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub telegid: Option<i64>,
}

/// A successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    /// Unix timestamp the token stops being accepted at.
    pub expires_at: i64,
    pub user: User,
}

const NAME_RULE: &str = "name may only contain letters and spaces";
const PASSWORD_RULE: &str =
    "password must be 9 to 12 characters of letters, digits or _!@#$%^&*-";

fn hash(password: &str) -> Result<String> {
    password::hash_password(password)
        .map_err(|e| Error::Internal(format!("Password hashing failed: {e}")))
}

/// Account operations over the user table.
///
/// Login and token checks also need a [`JwtManager`], attached with
/// [`UserService::with_tokens`]. Without one they fail with
/// [`Error::Internal`].
pub struct UserService {
    db: HubDatabase,
    jwt: Option<Arc<JwtManager>>,
}

impl UserService {
    pub const fn new(db: HubDatabase) -> Self {
        Self { db, jwt: None }
    }

    #[must_use]
    pub fn with_tokens(mut self, jwt: Arc<JwtManager>) -> Self {
        self.jwt = Some(jwt);
        self
    }

    fn tokens(&self) -> Result<&JwtManager> {
        self.jwt
            .as_deref()
            .ok_or_else(|| Error::Internal("session tokens are not configured".into()))
    }

    /// Create an account. New accounts are always guests.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn create(&self, user: NewUser) -> Result<User> {
        if !is_valid_name(&user.name) {
            return Err(Error::InvalidInput(NAME_RULE.into()));
        }
        if !is_valid_password(&user.password) {
            return Err(Error::InvalidInput(PASSWORD_RULE.into()));
        }
        let email = Email::parse(&user.email)
            .ok_or_else(|| Error::InvalidInput(format!("invalid email {}", user.email)))?;

        let created = self
            .db
            .insert_user(&NewUserRecord {
                name: user.name,
                email,
                role: Role::Guest,
                telegid: user.telegid,
                auth: hash(&user.password)?,
            })
            .await?;

        info!(user_id = %created.id, "User created");
        Ok(created)
    }

    /// Patch an account addressed by email or id.
    #[instrument(skip(self, patch))]
    pub async fn edit(&self, identifier: &str, patch: UserPatch) -> Result<()> {
        let filter = resolve::<Email>(identifier)?;

        let mut update = UserUpdate::default();
        if let Some(name) = patch.name {
            if !is_valid_name(&name) {
                return Err(Error::InvalidInput(NAME_RULE.into()));
            }
            update.name = Some(name);
        }
        if let Some(password) = patch.password {
            if !is_valid_password(&password) {
                return Err(Error::InvalidInput(PASSWORD_RULE.into()));
            }
            update.auth = Some(hash(&password)?);
        }
        update.telegid = patch.telegid;

        if update.is_empty() {
            return Ok(());
        }
        if self.db.update_user(&filter, &update).await? == 0 {
            return Err(Error::NotFound(format!("User {filter}")));
        }
        info!("User updated");
        Ok(())
    }

    /// Check credentials and issue a session token.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let parsed = Email::parse(email)
            .ok_or_else(|| Error::InvalidInput(format!("invalid email {email}")))?;

        let mut matches = self.db.find_users_by_email(&parsed).await?;
        if matches.len() != 1 {
            if matches.len() > 1 {
                warn!(count = matches.len(), "Email matches more than one account");
            }
            return Err(Error::NotFound(format!("User email={email}")));
        }
        let user = matches.remove(0);

        let valid = password::verify_password(password, &user.auth)
            .map_err(|e| Error::Internal(format!("Password verification failed: {e}")))?;
        if !valid {
            warn!("Failed login attempt");
            return Err(Error::AuthenticationFailed);
        }

        let (token, expires_at) = self
            .tokens()?
            .issue(&user.email, user.role)
            .map_err(|e| Error::Internal(format!("Token creation failed: {e}")))?;

        info!(user_id = %user.id, "User logged in");
        Ok(Session {
            token,
            expires_at,
            user,
        })
    }

    /// Verify a session token. Only signature and expiry are checked, so a
    /// token outlives its account until it expires.
    pub fn authorize(&self, token: &str) -> Result<Claims> {
        self.tokens()?
            .validate(token)
            .map_err(|e| Error::AuthorizationFailed(e.to_string()))
    }

    /// Permanently remove an account.
    #[instrument(skip(self))]
    pub async fn delete(&self, identifier: &str) -> Result<()> {
        let filter = resolve::<Email>(identifier)?;
        self.db.delete_user(&filter).await?;
        info!("User deleted");
        Ok(())
    }

    pub async fn find(&self, identifier: &str) -> Result<User> {
        let filter = resolve::<Email>(identifier)?;
        Ok(self.db.get_user(&filter).await?)
    }
}
