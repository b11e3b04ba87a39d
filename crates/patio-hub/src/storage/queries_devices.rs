//! Device queries for the Patio hub.

use patio_core::db::{DatabaseError, unix_timestamp};
use tracing::debug;

use super::db::HubDatabase;
use super::models::{Device, DeviceRow, NewDevice};
use crate::identity::{DeviceFilter, Email, ObjectId};
use crate::schedule::Configuration;

/// Fetch one device row matching `field = value`.
///
/// `field` always comes from [`DeviceFilter::field`], a closed set of
/// column names.
async fn fetch_row<'e, E>(
    executor: E,
    field: &str,
    value: &str,
) -> Result<Option<DeviceRow>, DatabaseError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let sql = format!("SELECT * FROM devices WHERE {field} = ?");
    let row = sqlx::query_as::<_, DeviceRow>(&sql)
        .bind(value)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

async fn fetch_users<'e, E>(executor: E, device_id: &str) -> Result<Vec<String>, DatabaseError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT email FROM device_users WHERE device_id = ? ORDER BY email")
            .bind(device_id)
            .fetch_all(executor)
            .await?;
    Ok(rows.into_iter().map(|(email,)| email).collect())
}

fn not_found(filter: &DeviceFilter) -> DatabaseError {
    DatabaseError::NotFound(format!("Device {filter}"))
}

impl HubDatabase {
    async fn assemble(&self, row: DeviceRow) -> Result<Device, DatabaseError> {
        let users = fetch_users(self.pool(), &row.id).await?;
        Ok(row.into_device(users))
    }

    async fn get_device_by_id(&self, id: &str) -> Result<Device, DatabaseError> {
        let row = fetch_row(self.pool(), "id", id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Device id={id}")))?;
        self.assemble(row).await
    }

    /// Get a single device.
    pub async fn get_device(&self, filter: &DeviceFilter) -> Result<Device, DatabaseError> {
        let row = fetch_row(self.pool(), filter.field(), &filter.value())
            .await?
            .ok_or_else(|| not_found(filter))?;
        self.assemble(row).await
    }

    /// Register a device.
    ///
    /// The count check is a fast path. The `UNIQUE` constraint on `mac`
    /// catches concurrent registrations of the same MAC.
    pub async fn insert_device(&self, device: &NewDevice) -> Result<Device, DatabaseError> {
        let mac = device.mac.as_str();
        let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices WHERE mac = ?")
            .bind(mac)
            .fetch_one(self.pool())
            .await?;
        if existing != 0 {
            return Err(DatabaseError::DuplicateKey(format!(
                "device with mac {mac} already registered"
            )));
        }

        let id = ObjectId::new().to_hex();
        let now = unix_timestamp();
        let cfg = &device.config;

        let mut tx = self.pool().begin().await?;
        sqlx::query(
            "INSERT INTO devices (id, mac, name, location, make, sched_type, tick_at, pulse_gap, interval_secs, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(mac)
        .bind(&device.name)
        .bind(&device.location)
        .bind(&device.make)
        .bind(cfg.config)
        .bind(&cfg.tickat)
        .bind(cfg.pulsegap)
        .bind(cfg.interval)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for email in &device.users {
            sqlx::query("INSERT OR IGNORE INTO device_users (device_id, email) VALUES (?, ?)")
                .bind(&id)
                .bind(email.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(device_id = %id, mac, "Device inserted");
        self.get_device_by_id(&id).await
    }

    /// Capture the current schedule, then overwrite it.
    ///
    /// Read, write and read-back run in one transaction so the returned
    /// pre-image is exactly what the write replaced, and nothing runs after
    /// the commit.
    pub async fn backup_then_set_config(
        &self,
        filter: &DeviceFilter,
        config: &Configuration,
    ) -> Result<(Configuration, Device), DatabaseError> {
        let mut tx = self.pool().begin().await?;
        let row = fetch_row(&mut *tx, filter.field(), &filter.value())
            .await?
            .ok_or_else(|| not_found(filter))?;
        let pre_image = row.config();

        sqlx::query(
            "UPDATE devices SET sched_type = ?, tick_at = ?, pulse_gap = ?, interval_secs = ?, updated_at = ? WHERE id = ?",
        )
        .bind(config.config)
        .bind(&config.tickat)
        .bind(config.pulsegap)
        .bind(config.interval)
        .bind(unix_timestamp())
        .bind(&row.id)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_row(&mut *tx, "id", &row.id)
            .await?
            .ok_or_else(|| not_found(filter))?;
        let users = fetch_users(&mut *tx, &row.id).await?;
        tx.commit().await?;

        Ok((pre_image, updated.into_device(users)))
    }

    /// Overwrite the schedule unconditionally.
    pub async fn set_config(
        &self,
        filter: &DeviceFilter,
        config: &Configuration,
    ) -> Result<Device, DatabaseError> {
        let sql = format!(
            "UPDATE devices SET sched_type = ?, tick_at = ?, pulse_gap = ?, interval_secs = ?, updated_at = ? WHERE {} = ?",
            filter.field()
        );
        let result = sqlx::query(&sql)
            .bind(config.config)
            .bind(&config.tickat)
            .bind(config.pulsegap)
            .bind(config.interval)
            .bind(unix_timestamp())
            .bind(filter.value())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(filter));
        }
        self.get_device(filter).await
    }

    /// Add users to a device. Emails already present are left alone.
    pub async fn add_device_users(
        &self,
        filter: &DeviceFilter,
        users: &[Email],
    ) -> Result<Device, DatabaseError> {
        let mut tx = self.pool().begin().await?;
        let row = fetch_row(&mut *tx, filter.field(), &filter.value())
            .await?
            .ok_or_else(|| not_found(filter))?;

        for email in users {
            sqlx::query("INSERT OR IGNORE INTO device_users (device_id, email) VALUES (?, ?)")
                .bind(&row.id)
                .bind(email.as_str())
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("UPDATE devices SET updated_at = ? WHERE id = ?")
            .bind(unix_timestamp())
            .bind(&row.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.get_device_by_id(&row.id).await
    }

    /// Hard-delete a device and its user links.
    pub async fn remove_device(&self, filter: &DeviceFilter) -> Result<u64, DatabaseError> {
        let sql = format!("DELETE FROM devices WHERE {} = ?", filter.field());
        let result = sqlx::query(&sql)
            .bind(filter.value())
            .execute(self.pool())
            .await?;

        match result.rows_affected() {
            0 => Err(not_found(filter)),
            n => Ok(n),
        }
    }

    /// All devices a user is authorized on.
    pub async fn devices_for_user(&self, email: &Email) -> Result<Vec<Device>, DatabaseError> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            "SELECT d.* FROM devices d JOIN device_users u ON u.device_id = d.id WHERE u.email = ? ORDER BY d.created_at, d.id",
        )
        .bind(email.as_str())
        .fetch_all(self.pool())
        .await?;

        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            devices.push(self.assemble(row).await?);
        }
        Ok(devices)
    }
}
