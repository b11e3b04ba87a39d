//! The device persistence seam used by the sync orchestrator.

use async_trait::async_trait;
use patio_core::db::DatabaseError;

use super::db::HubDatabase;
use super::models::{Device, NewDevice};
use crate::identity::{DeviceFilter, Email};
use crate::schedule::Configuration;

/// Persistence over device records.
///
/// `NotFound` is always reported as [`DatabaseError::NotFound`], separately
/// from a failed query.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, filter: &DeviceFilter) -> Result<Device, DatabaseError>;

    /// Capture the current configuration, then write `config`. Returns the
    /// pre-image and the updated record.
    async fn backup_then_set(
        &self,
        filter: &DeviceFilter,
        config: &Configuration,
    ) -> Result<(Configuration, Device), DatabaseError>;

    /// Unconditional overwrite, used to write a pre-image back.
    async fn set(&self, filter: &DeviceFilter, config: &Configuration)
    -> Result<Device, DatabaseError>;

    /// Idempotent union of `users` into the device's user set.
    async fn add_users(&self, filter: &DeviceFilter, users: &[Email])
    -> Result<Device, DatabaseError>;

    /// Hard delete. Zero deleted is `NotFound`.
    async fn remove(&self, filter: &DeviceFilter) -> Result<u64, DatabaseError>;

    /// Register a device. A taken MAC is `DuplicateKey`.
    async fn insert(&self, device: &NewDevice) -> Result<Device, DatabaseError>;

    async fn devices_for_user(&self, email: &Email) -> Result<Vec<Device>, DatabaseError>;
}

#[async_trait]
impl ConfigStore for HubDatabase {
    async fn get(&self, filter: &DeviceFilter) -> Result<Device, DatabaseError> {
        self.get_device(filter).await
    }

    async fn backup_then_set(
        &self,
        filter: &DeviceFilter,
        config: &Configuration,
    ) -> Result<(Configuration, Device), DatabaseError> {
        self.backup_then_set_config(filter, config).await
    }

    async fn set(
        &self,
        filter: &DeviceFilter,
        config: &Configuration,
    ) -> Result<Device, DatabaseError> {
        self.set_config(filter, config).await
    }

    async fn add_users(
        &self,
        filter: &DeviceFilter,
        users: &[Email],
    ) -> Result<Device, DatabaseError> {
        self.add_device_users(filter, users).await
    }

    async fn remove(&self, filter: &DeviceFilter) -> Result<u64, DatabaseError> {
        self.remove_device(filter).await
    }

    async fn insert(&self, device: &NewDevice) -> Result<Device, DatabaseError> {
        self.insert_device(device).await
    }

    async fn devices_for_user(&self, email: &Email) -> Result<Vec<Device>, DatabaseError> {
        HubDatabase::devices_for_user(self, email).await
    }
}
