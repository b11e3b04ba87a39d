//! Data models for Patio hub storage.

use serde::{Deserialize, Serialize};

use crate::identity::{Email, MacAddress};
use crate::schedule::Configuration;

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub mac: String,
    pub name: String,
    pub location: String,
    pub make: String,
    /// Emails of users authorized on this device, sorted.
    pub users: Vec<String>,
    pub config: Configuration,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Row shape of the `devices` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DeviceRow {
    pub id: String,
    pub mac: String,
    pub name: String,
    pub location: String,
    pub make: String,
    pub sched_type: i64,
    pub tick_at: String,
    pub pulse_gap: i64,
    pub interval_secs: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DeviceRow {
    pub fn config(&self) -> Configuration {
        Configuration {
            config: self.sched_type,
            tickat: self.tick_at.clone(),
            pulsegap: self.pulse_gap,
            interval: self.interval_secs,
        }
    }

    pub fn into_device(self, users: Vec<String>) -> Device {
        let config = self.config();
        Device {
            id: self.id,
            mac: self.mac,
            name: self.name,
            location: self.location,
            make: self.make,
            users,
            config,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A device about to be registered.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub mac: MacAddress,
    pub name: String,
    pub location: String,
    pub make: String,
    pub users: Vec<Email>,
    pub config: Configuration,
}

/// Account privilege tier, most privileged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, sqlx::Type, Serialize, Deserialize)]
#[repr(i64)]
#[serde(into = "u8", try_from = "u8")]
pub enum Role {
    SuperUser = 0,
    Admin = 1,
    EndUser = 2,
    Guest = 3,
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role as Self
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SuperUser),
            1 => Ok(Self::Admin),
            2 => Ok(Self::EndUser),
            3 => Ok(Self::Guest),
            other => Err(format!("unknown role {other}")),
        }
    }
}

/// A user account. The password hash never leaves the process.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub telegid: i64,
    #[serde(skip)]
    pub auth: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A user row about to be inserted. `auth` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub name: String,
    pub email: Email,
    pub role: Role,
    pub telegid: i64,
    pub auth: String,
}

/// Columns to change on a user. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub auth: Option<String>,
    pub telegid: Option<i64>,
}

impl UserUpdate {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.auth.is_none() && self.telegid.is_none()
    }
}
