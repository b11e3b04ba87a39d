//! Device registry: register, look up, authorize users on, and remove
//! devices.
//!
//! Identifiers are resolved here, so callers pass whatever they were given
//! (a MAC in either delimiter style, or a surrogate id).

use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::identity::{Email, MacAddress, NaturalKey, resolve};
use crate::schedule::{Configuration, rejection_reason};
use crate::storage::{ConfigStore, Device, NewDevice};

/// A device announcing itself.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub mac: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub make: String,
    /// Emails of users allowed on the device.
    #[serde(default)]
    pub users: Vec<String>,
    /// Initial schedule. Defaults to tick-every with zeroed fields.
    #[serde(default)]
    pub config: Option<Configuration>,
}

fn parse_emails(raw: &[String]) -> Result<Vec<Email>> {
    raw.iter()
        .map(|email| {
            Email::parse(email).ok_or_else(|| Error::InvalidInput(format!("invalid email {email}")))
        })
        .collect()
}

pub struct DeviceRegistry<S> {
    store: S,
}

impl<S: ConfigStore> DeviceRegistry<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a new device. A MAC already registered is `DuplicateKey`
    /// and the existing record is left untouched.
    #[instrument(skip(self, registration), fields(mac = %registration.mac))]
    pub async fn register(&self, registration: Registration) -> Result<Device> {
        let mac = MacAddress::parse(&registration.mac).ok_or_else(|| {
            Error::InvalidInput(format!("device mac {} is invalid", registration.mac))
        })?;
        let users = parse_emails(&registration.users)?;
        let config = registration.config.unwrap_or_default();
        if let Some(reason) = rejection_reason(&config) {
            return Err(Error::InvalidInput(reason.to_string()));
        }

        let device = self
            .store
            .insert(&NewDevice {
                mac,
                name: registration.name,
                location: registration.location,
                make: registration.make,
                users,
                config,
            })
            .await?;
        info!(device_id = %device.id, "Device registered");
        Ok(device)
    }

    pub async fn get(&self, identifier: &str) -> Result<Device> {
        let filter = resolve::<MacAddress>(identifier)?;
        Ok(self.store.get(&filter).await?)
    }

    /// A device's current schedule.
    pub async fn get_config(&self, identifier: &str) -> Result<Configuration> {
        Ok(self.get(identifier).await?.config)
    }

    /// Permanently remove a device.
    #[instrument(skip(self))]
    pub async fn unregister(&self, identifier: &str) -> Result<()> {
        let filter = resolve::<MacAddress>(identifier)?;
        let removed = self.store.remove(&filter).await?;
        info!(removed, "Device unregistered");
        Ok(())
    }

    /// Add users to a device. Users already on the device are kept once.
    #[instrument(skip(self, users))]
    pub async fn authorize_users(&self, identifier: &str, users: &[String]) -> Result<Device> {
        let filter = resolve::<MacAddress>(identifier)?;
        let users = parse_emails(users)?;
        Ok(self.store.add_users(&filter, &users).await?)
    }

    /// Devices the user is authorized on.
    pub async fn devices_for_user(&self, email: &str) -> Result<Vec<Device>> {
        let email = Email::parse(email)
            .ok_or_else(|| Error::InvalidInput(format!("invalid email {email}")))?;
        Ok(self.store.devices_for_user(&email).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::HubDatabase;
    use crate::test_helpers::{PUMP_MAC, seeded_db};

    fn registration(mac: &str) -> Registration {
        Registration {
            mac: mac.to_string(),
            name: "Pump-I0".into(),
            location: "18.41828900932213, 73.76933368232831".into(),
            make: "Raspberry Pi 0w 512MB, 1GRM".into(),
            users: vec![
                "jionesco0@globo.com".into(),
                "koreilly1@wufoo.com".into(),
                "cdomoni2@ycombinator.com".into(),
            ],
            config: None,
        }
    }

    async fn empty_registry() -> DeviceRegistry<HubDatabase> {
        DeviceRegistry::new(HubDatabase::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn register_then_get_by_either_key() {
        let registry = empty_registry().await;
        let device = registry.register(registration(PUMP_MAC)).await.unwrap();
        assert_eq!(device.users.len(), 3);

        let by_mac = registry.get("45:36:17:e3:1c:70").await.unwrap();
        let by_id = registry.get(&device.id).await.unwrap();
        assert_eq!(by_mac, device);
        assert_eq!(by_id, device);
    }

    #[tokio::test]
    async fn second_registration_of_a_mac_is_duplicate() {
        let registry = empty_registry().await;
        let first = registry.register(registration(PUMP_MAC)).await.unwrap();

        let err = registry
            .register(registration(PUMP_MAC))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
        assert_eq!(registry.get(PUMP_MAC).await.unwrap(), first);
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let registry = empty_registry().await;

        let err = registry
            .register(registration("45-36-17-E3-1C"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let mut bad_user = registration(PUMP_MAC);
        bad_user.users.push("not-an-email".into());
        let err = registry.register(bad_user).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let mut bad_schedule = registration(PUMP_MAC);
        bad_schedule.config = Some(Configuration {
            config: 2,
            ..Configuration::default()
        });
        let err = registry.register(bad_schedule).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert!(matches!(
            registry.get(PUMP_MAC).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn registration_reads_from_json() {
        let raw = r#"{"mac":"45-36-17-E3-1C-70","name":"Pump-I0","users":["jionesco0@globo.com"]}"#;
        let registration: Registration = serde_json::from_str(raw).unwrap();
        assert!(registration.config.is_none());
        assert_eq!(registration.users.len(), 1);
        assert!(registration.make.is_empty());
    }

    #[tokio::test]
    async fn authorize_users_is_idempotent() {
        let (db, _) = seeded_db().await;
        let registry = DeviceRegistry::new(db);
        let users = vec!["newuser@example.com".to_string()];

        let once = registry.authorize_users(PUMP_MAC, &users).await.unwrap();
        let twice = registry.authorize_users(PUMP_MAC, &users).await.unwrap();
        assert_eq!(once.users, twice.users);
        assert_eq!(twice.users.len(), 2);
    }

    #[tokio::test]
    async fn unregister_then_not_found() {
        let (db, device) = seeded_db().await;
        let registry = DeviceRegistry::new(db);

        registry.unregister(&device.id).await.unwrap();
        assert!(matches!(
            registry.unregister(PUMP_MAC).await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            registry.unregister("garbage").await.unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn get_config_reads_the_stored_schedule() {
        let (db, device) = seeded_db().await;
        let registry = DeviceRegistry::new(db);

        assert_eq!(registry.get_config(&device.id).await.unwrap(), device.config);
        assert!(matches!(
            registry.get_config("00:00:00:00:00:01").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn lists_devices_for_user() {
        let (db, device) = seeded_db().await;
        let registry = DeviceRegistry::new(db);

        let devices = registry
            .devices_for_user("jionesco0@globo.com")
            .await
            .unwrap();
        assert_eq!(devices, vec![device]);
        assert!(
            registry
                .devices_for_user("nobody@example.com")
                .await
                .unwrap()
                .is_empty()
        );
    }
}
