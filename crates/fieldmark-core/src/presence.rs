//! Device presence: publish our own location, track everyone else's.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DeviceLocation, LatLng};
use crate::util::unix_timestamp_millis;

/// Locations older than this are no longer shown.
pub const PRESENCE_HORIZON_MS: i64 = 5 * 60 * 1000;

/// Storage for device location records.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Upsert one device's location, keyed by its `device_id`.
    async fn publish(&self, location: &DeviceLocation) -> Result<()>;

    /// All locations reported at or after `since_ms`.
    async fn recent(&self, since_ms: i64) -> Result<Vec<DeviceLocation>>;
}

/// Changes between two presence snapshots, for marker add/move/remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceDiff {
    pub appeared: Vec<String>,
    pub moved: Vec<String>,
    pub departed: Vec<String>,
}

impl PresenceDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.moved.is_empty() && self.departed.is_empty()
    }
}

/// Rolling window of other devices' last-known locations.
///
/// Pure state: feeding it fetched records plus a clock keeps it fully
/// deterministic under test.
#[derive(Debug)]
pub struct PresenceTracker {
    own_device_id: String,
    devices: HashMap<String, DeviceLocation>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(own_device_id: impl Into<String>) -> Self {
        Self {
            own_device_id: own_device_id.into(),
            devices: HashMap::new(),
        }
    }

    /// Replace the window with a fresh fetch, reporting what changed.
    ///
    /// Records older than [`PRESENCE_HORIZON_MS`] relative to `now_ms` are
    /// dropped, as is the querying device's own record.
    pub fn apply(&mut self, fetched: Vec<DeviceLocation>, now_ms: i64) -> PresenceDiff {
        let cutoff = now_ms - PRESENCE_HORIZON_MS;
        let fresh: HashMap<String, DeviceLocation> = fetched
            .into_iter()
            .filter(|location| location.device_id != self.own_device_id)
            .filter(|location| location.timestamp.is_some_and(|reported| reported >= cutoff))
            .map(|location| (location.device_id.clone(), location))
            .collect();

        let mut diff = PresenceDiff::default();
        for (device_id, location) in &fresh {
            match self.devices.get(device_id) {
                None => diff.appeared.push(device_id.clone()),
                Some(previous) if previous.position() != location.position() => {
                    diff.moved.push(device_id.clone());
                }
                Some(_) => {}
            }
        }
        for device_id in self.devices.keys() {
            if !fresh.contains_key(device_id) {
                diff.departed.push(device_id.clone());
            }
        }
        diff.appeared.sort();
        diff.moved.sort();
        diff.departed.sort();

        self.devices = fresh;
        diff
    }

    /// Devices currently inside the window, unordered.
    pub fn active(&self) -> impl Iterator<Item = &DeviceLocation> {
        self.devices.values()
    }

    /// Position lookup for "center the map on device X".
    #[must_use]
    pub fn locate(&self, device_id: &str) -> Option<LatLng> {
        self.devices
            .get(device_id)
            .map(DeviceLocation::position)
    }
}

/// Presence I/O shell: owns the tracker plus the backing store.
///
/// Runs on its own cadence, independent of marking sync; our own record is
/// exclusively ours to write, so publishing never merge-conflicts.
pub struct PresenceService {
    store: Arc<dyn PresenceStore>,
    tracker: PresenceTracker,
    device_id: String,
    device_name: String,
    is_installed_app: bool,
}

impl PresenceService {
    #[must_use]
    pub fn new(
        store: Arc<dyn PresenceStore>,
        device_id: impl Into<String>,
        device_name: impl Into<String>,
        is_installed_app: bool,
    ) -> Self {
        let device_id = device_id.into();
        Self {
            tracker: PresenceTracker::new(device_id.clone()),
            store,
            device_id,
            device_name: device_name.into(),
            is_installed_app,
        }
    }

    /// Upsert this device's current location.
    pub async fn publish_self(&self, position: LatLng) -> Result<()> {
        let location = DeviceLocation {
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
            lat: position.lat,
            lng: position.lng,
            timestamp: Some(unix_timestamp_millis()),
            is_installed_app: self.is_installed_app,
        };
        self.store.publish(&location).await
    }

    /// Fetch the recent window and fold it into the tracker.
    pub async fn refresh(&mut self) -> Result<PresenceDiff> {
        let now_ms = unix_timestamp_millis();
        let fetched = self.store.recent(now_ms - PRESENCE_HORIZON_MS).await?;
        Ok(self.tracker.apply(fetched, now_ms))
    }

    #[must_use]
    pub const fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }
}
