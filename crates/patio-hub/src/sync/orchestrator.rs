//! Configuration sync: write the schedule, notify the device, revert on
//! failure.
//!
//! The stored schedule is the source of truth. A change is only left in
//! place once the device notification has been accepted by the broker; if
//! publishing fails the pre-image is written back. A write that fails or
//! times out may already have committed, so it is undone the same way.
//! When a write-back also fails the record no longer matches what the
//! device runs, which is reported as [`Error::OutOfSync`] and logged for an
//! operator.

use std::future::Future;

use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use super::locks::DeviceLocks;
use super::policy::SyncPolicy;
use crate::error::{Error, Result};
use crate::identity::{DeviceFilter, MacAddress, ObjectId, resolve};
use crate::notify::{Message, NotificationError, NotificationPublisher};
use crate::schedule::{Configuration, rejection_reason};
use crate::storage::{ConfigStore, DatabaseError, Device};

const PAYLOAD_CONTENT_TYPE: &str = "application/json";

/// Where a configuration-change request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Invalid identifier or schedule. Nothing was written.
    Rejected,
    /// The device could not be read or written. Nothing was published.
    Failed,
    /// Stored and published.
    Applied,
    /// Publishing failed and the previous schedule was restored.
    AppliedButReverted,
    /// Publishing failed and so did the restore.
    OutOfSync,
}

impl SyncState {
    pub const fn from_result(result: &Result<Device>) -> Self {
        match result {
            Ok(_) => Self::Applied,
            Err(Error::InvalidInput(_)) => Self::Rejected,
            Err(Error::NotificationFault(_)) => Self::AppliedButReverted,
            Err(Error::OutOfSync { .. }) => Self::OutOfSync,
            Err(_) => Self::Failed,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Applied => "applied",
            Self::AppliedButReverted => "applied_but_reverted",
            Self::OutOfSync => "out_of_sync",
        }
    }
}

/// Drives configuration changes through store and publisher.
pub struct ConfigSync<S, P> {
    store: S,
    publisher: P,
    destination: String,
    policy: SyncPolicy,
    locks: DeviceLocks,
}

impl<S: ConfigStore, P: NotificationPublisher> ConfigSync<S, P> {
    /// `destination` is the queue devices consume configuration from.
    pub fn new(store: S, publisher: P, destination: impl Into<String>, policy: SyncPolicy) -> Self {
        Self {
            store,
            publisher,
            destination: destination.into(),
            policy,
            locks: DeviceLocks::new(),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Replace a device's schedule and notify the device.
    ///
    /// Returns the updated device when the notification was accepted.
    /// Otherwise the returned error says how far the change got; see
    /// [`SyncState::from_result`].
    #[instrument(skip(self, config), fields(destination = %self.destination))]
    pub async fn update_config(&self, identifier: &str, config: &Configuration) -> Result<Device> {
        let result = self.apply(identifier, config).await;
        let state = SyncState::from_result(&result);
        match &result {
            Ok(device) => info!(device = %device.mac, state = state.as_str(), "Configuration applied"),
            Err(Error::OutOfSync { .. }) => {}
            Err(e) => warn!(state = state.as_str(), error = %e, "Configuration not applied"),
        }
        result
    }

    async fn apply(&self, identifier: &str, config: &Configuration) -> Result<Device> {
        if let Some(reason) = rejection_reason(config) {
            return Err(Error::InvalidInput(reason.to_string()));
        }
        let filter = resolve::<MacAddress>(identifier)?;

        let located = self.bounded(self.store.get(&filter)).await?;
        let _guard = self.locks.acquire(&located.id).await;
        let by_id = DeviceFilter::ById(located.id.parse::<ObjectId>()?);
        let current = self.bounded(self.store.get(&by_id)).await?;

        let payload = config
            .to_payload()
            .map_err(|e| Error::Internal(format!("failed to serialize schedule: {e}")))?;
        let message =
            Message::new(PAYLOAD_CONTENT_TYPE, payload).with_header("device", current.mac.clone());

        let (pre_image, device) = match self
            .bounded(self.store.backup_then_set(&by_id, config))
            .await
        {
            Ok(written) => written,
            Err(write_err) => return self.undo_write(&by_id, &current, write_err).await,
        };

        match self.notify(&message).await {
            Ok(()) => Ok(device),
            Err(notify_err) => self.revert(&by_id, &device.mac, &pre_image, notify_err).await,
        }
    }

    /// Publish with the policy's timeout and retries.
    async fn notify(&self, message: &Message) -> std::result::Result<(), NotificationError> {
        let mut attempt = 0;
        loop {
            let outcome = timeout(
                self.policy.op_timeout,
                self.publisher.publish(&self.destination, message),
            )
            .await
            .unwrap_or(Err(NotificationError::Timeout(self.policy.op_timeout)));

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) if self.policy.should_retry(attempt) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(attempt, error = %e, ?delay, "Publish failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Restore the schedule read under the lock after a failed write.
    ///
    /// A write that errored or timed out may still have committed, so the
    /// pre-read schedule is written back before the failure is reported.
    async fn undo_write(
        &self,
        filter: &DeviceFilter,
        current: &Device,
        write_err: Error,
    ) -> Result<Device> {
        if matches!(write_err, Error::NotFound(_)) {
            return Err(write_err);
        }
        match self.bounded(self.store.set(filter, &current.config)).await {
            Ok(_) | Err(Error::NotFound(_)) => Err(write_err),
            Err(revert_err) => Err(out_of_sync(&current.mac, &write_err, &revert_err)),
        }
    }

    /// Write the pre-image back after a failed publish.
    async fn revert(
        &self,
        filter: &DeviceFilter,
        mac: &str,
        pre_image: &Configuration,
        notify_err: NotificationError,
    ) -> Result<Device> {
        let cause = Error::from(notify_err);
        match self.bounded(self.store.set(filter, pre_image)).await {
            Ok(_) => {
                warn!(device = mac, error = %cause, "Notification failed, configuration reverted");
                Err(cause)
            }
            Err(revert_err) => Err(out_of_sync(mac, &cause, &revert_err)),
        }
    }

    /// Run a store call under the operation timeout.
    async fn bounded<T>(
        &self,
        op: impl Future<Output = std::result::Result<T, DatabaseError>>,
    ) -> Result<T> {
        timeout(self.policy.op_timeout, op)
            .await
            .map_err(|_| {
                Error::StorageFault(format!(
                    "storage call timed out after {:?}",
                    self.policy.op_timeout
                ))
            })?
            .map_err(Error::from)
    }
}

/// Log and build the error for a change that could not be undone.
fn out_of_sync(mac: &str, cause: &Error, revert_err: &Error) -> Error {
    error!(
        alert = "out_of_sync",
        device = mac,
        cause = %cause,
        revert = %revert_err,
        "Stored configuration was never delivered and could not be reverted"
    );
    Error::OutOfSync {
        device: mac.to_string(),
        cause: cause.to_string(),
        revert: revert_err.to_string(),
    }
}
