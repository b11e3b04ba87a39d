//! Per-device serialization of configuration changes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock map keyed by device surrogate id.
///
/// Entries nobody holds or waits on are pruned on the next acquire.
#[derive(Clone, Default)]
pub struct DeviceLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `device_id`. Released when the guard
    /// drops.
    pub async fn acquire(&self, device_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(device_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of devices with a live lock entry.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_device_is_exclusive() {
        let locks = DeviceLocks::new();
        let guard = locks.acquire("a").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.acquire("a").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_devices_do_not_block() {
        let locks = DeviceLocks::new();
        let _a = locks.acquire("a").await;
        tokio::time::timeout(Duration::from_secs(1), locks.acquire("b"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = DeviceLocks::new();
        drop(locks.acquire("a").await);
        drop(locks.acquire("b").await);
        let _c = locks.acquire("c").await;
        assert_eq!(locks.tracked().await, 1);
    }
}
