//! Shared fakes for hub test modules.
//!
//! Provides a recording [`NotificationPublisher`], a [`ConfigStore`] wrapper
//! that fails on demand, and a seeded in-memory database.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::identity::{DeviceFilter, Email, MacAddress, NaturalKey};
use crate::notify::{Message, NotificationError, NotificationPublisher};
use crate::schedule::Configuration;
use crate::storage::{ConfigStore, DatabaseError, Device, HubDatabase, NewDevice};

pub const PUMP_MAC: &str = "45-36-17-E3-1C-70";

/// A device record like the ones field units register with.
pub fn pump_device() -> NewDevice {
    NewDevice {
        mac: MacAddress::parse(PUMP_MAC).unwrap(),
        name: "Pump-I0".into(),
        location: "18.41828900932213, 73.76933368232831".into(),
        make: "Raspberry Pi 0w 512MB, 1GRM".into(),
        users: vec![Email::parse("jionesco0@globo.com").unwrap()],
        config: Configuration::default(),
    }
}

/// In-memory database with [`pump_device`] registered.
pub async fn seeded_db() -> (HubDatabase, Device) {
    let db = HubDatabase::open_in_memory().await.unwrap();
    let device = db.insert(&pump_device()).await.unwrap();
    (db, device)
}

/// Shared view of what a [`RecordingPublisher`] saw.
#[derive(Clone, Default)]
pub struct PublishLog {
    pub sent: Arc<Mutex<Vec<(String, Message)>>>,
    pub attempts: Arc<AtomicU32>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl PublishLog {
    pub fn sent(&self) -> Vec<(String, Message)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Publisher that records messages, optionally failing or stalling first.
#[derive(Default)]
pub struct RecordingPublisher {
    pub log: PublishLog,
    /// Fail this many attempts before succeeding.
    pub fail_first: u32,
    /// Fail every attempt.
    pub always_fail: bool,
    /// Hold each attempt this long before answering.
    pub delay: Option<Duration>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(
        &self,
        destination: &str,
        message: &Message,
    ) -> Result<(), NotificationError> {
        let attempt = self.log.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.always_fail || attempt < self.fail_first {
            return Err(NotificationError::Connect("connection refused".into()));
        }
        self.log
            .sent
            .lock()
            .unwrap()
            .push((destination.to_string(), message.clone()));
        Ok(())
    }
}

/// [`ConfigStore`] over a real database that can be told to fail writes.
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: HubDatabase,
    pub fail_backup: Arc<AtomicBool>,
    pub fail_set: Arc<AtomicBool>,
    /// Stall this long after `backup_then_set` has committed.
    pub stall_after_backup: Option<Duration>,
}

impl FlakyStore {
    pub fn new(inner: HubDatabase) -> Self {
        Self {
            inner,
            fail_backup: Arc::new(AtomicBool::new(false)),
            fail_set: Arc::new(AtomicBool::new(false)),
            stall_after_backup: None,
        }
    }
}

fn disk_error() -> DatabaseError {
    DatabaseError::Query("disk I/O error".into())
}

#[async_trait]
impl ConfigStore for FlakyStore {
    async fn get(&self, filter: &DeviceFilter) -> Result<Device, DatabaseError> {
        self.inner.get(filter).await
    }

    async fn backup_then_set(
        &self,
        filter: &DeviceFilter,
        config: &Configuration,
    ) -> Result<(Configuration, Device), DatabaseError> {
        if self.fail_backup.load(Ordering::SeqCst) {
            return Err(disk_error());
        }
        let written = self.inner.backup_then_set(filter, config).await;
        if let Some(stall) = self.stall_after_backup {
            tokio::time::sleep(stall).await;
        }
        written
    }

    async fn set(
        &self,
        filter: &DeviceFilter,
        config: &Configuration,
    ) -> Result<Device, DatabaseError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(disk_error());
        }
        self.inner.set(filter, config).await
    }

    async fn add_users(
        &self,
        filter: &DeviceFilter,
        users: &[Email],
    ) -> Result<Device, DatabaseError> {
        self.inner.add_users(filter, users).await
    }

    async fn remove(&self, filter: &DeviceFilter) -> Result<u64, DatabaseError> {
        self.inner.remove(filter).await
    }

    async fn insert(&self, device: &NewDevice) -> Result<Device, DatabaseError> {
        self.inner.insert(device).await
    }

    async fn devices_for_user(&self, email: &Email) -> Result<Vec<Device>, DatabaseError> {
        ConfigStore::devices_for_user(&self.inner, email).await
    }
}
