//! Presence store for tracking device transport connectivity
//!
//! This module handles:
//! - Recording transport connect/disconnect events per device
//! - Answering "is this device reachable right now" for the engine
//! - Optional staleness checks for heartbeat-driven deployments

use emberhub_shared::DeviceId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Last known transport-level state of a device. Best-effort: reflects the
/// most recent lifecycle event, not guaranteed real-time-accurate.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub connected: bool,
    pub last_seen: Instant,
    pub connected_at: Option<Instant>,
}

/// Tracks which devices currently have live transport connections.
///
/// Mutated by the transport layer's connection lifecycle hooks, read by the
/// execution engine before dispatch. Updates are independent per device; no
/// cross-device ordering is required.
pub struct PresenceStore {
    records: Arc<RwLock<HashMap<DeviceId, PresenceRecord>>>,
    /// Records older than this read as offline; `None` disables the check.
    ttl: Option<Duration>,
}

impl PresenceStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Record that a device's transport connection came up. Idempotent.
    pub async fn mark_connected(&self, device_id: &DeviceId) {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let record = records
            .entry(device_id.clone())
            .or_insert_with(|| PresenceRecord {
                connected: false,
                last_seen: now,
                connected_at: None,
            });
        if !record.connected {
            record.connected_at = Some(now);
        }
        record.connected = true;
        record.last_seen = now;
        debug!("Device connected: {}", device_id);
    }

    /// Record that a device's transport connection went away. Idempotent.
    pub async fn mark_disconnected(&self, device_id: &DeviceId) {
        let now = Instant::now();
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(device_id) {
            record.connected = false;
            record.connected_at = None;
            record.last_seen = now;
            debug!("Device disconnected: {}", device_id);
        }
        // Absence of a record means "never observed"; nothing to do.
    }

    /// Refresh a device's last-seen time, e.g. on a heartbeat.
    pub async fn mark_seen(&self, device_id: &DeviceId) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(device_id) {
            record.last_seen = Instant::now();
        }
    }

    /// Whether the device is known to have a live connection. A device never
    /// observed is not connected; with a ttl configured, a record that has
    /// gone stale also reads as offline.
    pub async fn is_connected(&self, device_id: &DeviceId) -> bool {
        let records = self.records.read().await;
        match records.get(device_id) {
            Some(record) if record.connected => match self.ttl {
                Some(ttl) => record.last_seen.elapsed() <= ttl,
                None => true,
            },
            _ => false,
        }
    }

    /// Snapshot of the current record for a device, if any.
    pub async fn get(&self, device_id: &DeviceId) -> Option<PresenceRecord> {
        self.records.read().await.get(device_id).cloned()
    }

    /// List of devices currently marked connected.
    pub async fn connected_devices(&self) -> Vec<DeviceId> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|(_, r)| r.connected)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of devices currently marked connected.
    pub async fn count(&self) -> usize {
        let records = self.records.read().await;
        records.values().filter(|r| r.connected).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_never_observed_is_offline() {
        let store = PresenceStore::new(None);
        assert!(!store.is_connected(&DeviceId::from("lamp-1")).await);
    }

    #[tokio::test]
    async fn test_connect_disconnect_cycle() {
        let store = PresenceStore::new(None);
        let id = DeviceId::from("lamp-1");

        store.mark_connected(&id).await;
        assert!(store.is_connected(&id).await);
        assert_eq!(store.count().await, 1);

        store.mark_disconnected(&id).await;
        assert!(!store.is_connected(&id).await);
        assert_eq!(store.count().await, 0);

        // Disconnected devices keep a record with their last-seen time.
        assert!(store.get(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_marks_are_idempotent() {
        let store = PresenceStore::new(None);
        let id = DeviceId::from("gate-1");

        store.mark_connected(&id).await;
        let first = store.get(&id).await.unwrap().connected_at;
        store.mark_connected(&id).await;
        let second = store.get(&id).await.unwrap().connected_at;
        assert_eq!(first, second, "reconnect mark should not reset connected_at");

        store.mark_disconnected(&id).await;
        store.mark_disconnected(&id).await;
        assert!(!store.is_connected(&id).await);
    }

    #[tokio::test]
    async fn test_stale_record_reads_offline_with_ttl() {
        let store = PresenceStore::new(Some(Duration::from_millis(20)));
        let id = DeviceId::from("sensor-1");

        store.mark_connected(&id).await;
        assert!(store.is_connected(&id).await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.is_connected(&id).await);

        store.mark_seen(&id).await;
        assert!(store.is_connected(&id).await);
    }

    #[tokio::test]
    async fn test_connected_devices_listing() {
        let store = PresenceStore::new(None);
        store.mark_connected(&DeviceId::from("a")).await;
        store.mark_connected(&DeviceId::from("b")).await;
        store.mark_disconnected(&DeviceId::from("b")).await;

        let connected = store.connected_devices().await;
        assert_eq!(connected, vec![DeviceId::from("a")]);
    }
}
