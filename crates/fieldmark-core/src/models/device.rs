//! Device location model

use serde::{Deserialize, Serialize};

use super::epoch;
use super::marking::LatLng;

/// Last-known location report for one device.
///
/// Each device exclusively owns the record keyed by its own `device_id` and
/// upserts it on every location update, so these never merge-conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLocation {
    pub device_id: String,
    pub device_name: String,
    pub lat: f64,
    pub lng: f64,
    /// Report time, epoch millis.
    #[serde(default, deserialize_with = "epoch::option")]
    pub timestamp: Option<i64>,
    /// Installed/standalone app context, as opposed to a plain browser tab.
    #[serde(default)]
    pub is_installed_app: bool,
}

impl DeviceLocation {
    #[must_use]
    pub const fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_iso_timestamp() {
        let json = r#"{
            "deviceId": "dev-1",
            "deviceName": "Field App (Mobile)",
            "lat": 35.0,
            "lng": 139.0,
            "timestamp": "2024-05-01T12:00:00Z",
            "isInstalledApp": true
        }"#;
        let location: DeviceLocation = serde_json::from_str(json).unwrap();
        assert_eq!(location.timestamp, Some(1_714_564_800_000));
        assert!(location.is_installed_app);
    }
}
