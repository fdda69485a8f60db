//! Marking record model and identity rules

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::epoch;
use crate::util::unix_timestamp_millis;

/// Two coordinates within this many degrees (~11 m) are considered the same
/// place for fallback identity matching.
pub const COORD_TOLERANCE_DEG: f64 = 1e-4;

/// Geometry class of a marking, matching the drawing tools offered by the map UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkingKind {
    Marker,
    Polygon,
    Rectangle,
    Circle,
    Polyline,
}

impl MarkingKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Marker => "marker",
            Self::Polygon => "polygon",
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Polyline => "polyline",
        }
    }
}

impl fmt::Display for MarkingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A geographic coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both axes are within [`COORD_TOLERANCE_DEG`] of `other`.
    #[must_use]
    pub fn near(self, other: Self) -> bool {
        (self.lat - other.lat).abs() < COORD_TOLERANCE_DEG
            && (self.lng - other.lng).abs() < COORD_TOLERANCE_DEG
    }
}

/// Where a marking came from.
///
/// Manual markings are drawn on the map; uploaded ones are imported from a
/// file and remember which one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum Origin {
    #[default]
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "upload")]
    Uploaded {
        #[serde(rename = "fileName")]
        file_name: String,
    },
}

/// Work-order metadata attached to a marking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkingProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub origin: Origin,
}

/// A single geotagged marking.
///
/// The wire shape is deliberately loose: early producers omitted `id`, point
/// and shape geometries use different fields, and timestamps arrive in mixed
/// formats (normalized on ingestion by [`epoch`]). A record missing its
/// coordinate fields still deserializes and survives merge untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: MarkingKind,
    /// Point latitude (markers and circle centers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Point longitude (markers and circle centers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Ordered vertices (polygons, rectangles, polylines).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<LatLng>>,
    /// Circle radius in meters.
    #[serde(rename = "radius", default, skip_serializing_if = "Option::is_none")]
    pub radius_m: Option<f64>,
    #[serde(default)]
    pub properties: MarkingProperties,
    /// Creation time, epoch millis.
    #[serde(
        default,
        deserialize_with = "epoch::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
    /// Last mutation time, epoch millis; the conflict tie-breaker.
    #[serde(
        default,
        deserialize_with = "epoch::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<i64>,
    /// Device that last wrote the record (provenance, not ownership).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Marking {
    fn base(kind: MarkingKind, properties: MarkingProperties, device_id: String) -> Self {
        let now = unix_timestamp_millis();
        Self {
            id: Some(Uuid::now_v7().to_string()),
            kind,
            lat: None,
            lng: None,
            coordinates: None,
            radius_m: None,
            properties,
            timestamp: Some(now),
            last_modified: Some(now),
            device_id: Some(device_id),
        }
    }

    /// Create a new point marking.
    #[must_use]
    pub fn new_marker(
        lat: f64,
        lng: f64,
        properties: MarkingProperties,
        device_id: impl Into<String>,
    ) -> Self {
        let mut marking = Self::base(MarkingKind::Marker, properties, device_id.into());
        marking.lat = Some(lat);
        marking.lng = Some(lng);
        marking
    }

    /// Create a new vertex-sequence marking (polygon, rectangle, polyline).
    #[must_use]
    pub fn new_shape(
        kind: MarkingKind,
        coordinates: Vec<LatLng>,
        properties: MarkingProperties,
        device_id: impl Into<String>,
    ) -> Self {
        let mut marking = Self::base(kind, properties, device_id.into());
        marking.coordinates = Some(coordinates);
        marking
    }

    /// Create a new circle marking.
    #[must_use]
    pub fn new_circle(
        center: LatLng,
        radius_m: f64,
        properties: MarkingProperties,
        device_id: impl Into<String>,
    ) -> Self {
        let mut marking = Self::base(MarkingKind::Circle, properties, device_id.into());
        marking.lat = Some(center.lat);
        marking.lng = Some(center.lng);
        marking.radius_m = Some(radius_m);
        marking
    }

    /// Record a local mutation: bump `last_modified` and provenance.
    pub fn touch(&mut self, device_id: &str) {
        self.last_modified = Some(unix_timestamp_millis());
        self.device_id = Some(device_id.to_string());
    }

    /// Representative coordinate for identity matching: the point itself, or
    /// the first vertex of a shape. `None` for malformed records.
    #[must_use]
    pub fn anchor_point(&self) -> Option<LatLng> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => self
                .coordinates
                .as_ref()
                .and_then(|vertices| vertices.first().copied()),
        }
    }

    /// Effective mutation time used for conflict resolution.
    #[must_use]
    pub fn effective_modified(&self) -> i64 {
        self.last_modified.or(self.timestamp).unwrap_or(0)
    }

    /// Strictly newer than `other` by effective mutation time.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.effective_modified() > other.effective_modified()
    }

    /// Stable key for deduplication and storage.
    ///
    /// The `id` when present; otherwise synthesized from timestamp, kind, and
    /// the anchor coordinate rounded to the matching tolerance.
    #[must_use]
    pub fn identity_key(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        let anchor = self.anchor_point().map_or_else(
            || "?".to_string(),
            |point| format!("{:.4},{:.4}", point.lat, point.lng),
        );
        format!("{}:{}:{anchor}", self.timestamp.unwrap_or(0), self.kind)
    }

    /// Identity rule for reconciliation.
    ///
    /// Matching ids always win. Records whose ids are absent (early producers
    /// never assigned one) or disagree across replicas fall back to exact
    /// creation-timestamp equality, then to anchor coordinates within
    /// [`COORD_TOLERANCE_DEG`] combined with an equal kind.
    #[must_use]
    pub fn same_entity(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (&self.id, &other.id) {
            if a == b {
                return true;
            }
        }
        if let (Some(a), Some(b)) = (self.timestamp, other.timestamp) {
            if a == b {
                return true;
            }
        }
        if self.kind != other.kind {
            return false;
        }
        match (self.anchor_point(), other.anchor_point()) {
            (Some(a), Some(b)) => a.near(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn marker(id: Option<&str>, timestamp: Option<i64>, lat: f64, lng: f64) -> Marking {
        Marking {
            id: id.map(String::from),
            kind: MarkingKind::Marker,
            lat: Some(lat),
            lng: Some(lng),
            coordinates: None,
            radius_m: None,
            properties: MarkingProperties::default(),
            timestamp,
            last_modified: timestamp,
            device_id: None,
        }
    }

    #[test]
    fn new_marker_mints_id_and_timestamps() {
        let marking = Marking::new_marker(35.0, 139.0, MarkingProperties::default(), "dev-1");
        assert!(marking.id.is_some());
        assert_eq!(marking.timestamp, marking.last_modified);
        assert_eq!(marking.anchor_point(), Some(LatLng::new(35.0, 139.0)));
        assert_eq!(marking.device_id.as_deref(), Some("dev-1"));
    }

    #[test]
    fn same_entity_by_id() {
        let a = marker(Some("m-1"), Some(100), 1.0, 1.0);
        let b = marker(Some("m-1"), Some(999), 50.0, 50.0);
        assert!(a.same_entity(&b));
    }

    #[test]
    fn same_entity_by_exact_timestamp_without_ids() {
        let a = marker(None, Some(1_700_000_000_000), 1.0, 1.0);
        let mut b = marker(None, Some(1_700_000_000_000), 40.0, 40.0);
        b.properties.product = Some("pipe".to_string());
        assert!(a.same_entity(&b));
    }

    #[test]
    fn same_entity_by_coordinate_tolerance() {
        let a = marker(None, None, 35.00001, 139.00001);
        let b = marker(None, None, 35.00005, 139.00008);
        assert!(a.same_entity(&b));

        let far = marker(None, None, 35.01, 139.0);
        assert!(!a.same_entity(&far));
    }

    #[test]
    fn coordinate_fallback_requires_matching_kind() {
        let a = marker(None, None, 35.0, 139.0);
        let mut b = marker(None, None, 35.0, 139.0);
        b.kind = MarkingKind::Circle;
        assert!(!a.same_entity(&b));
    }

    #[test]
    fn mismatched_ids_still_match_on_timestamp() {
        // A record that was assigned an id on one device only.
        let a = marker(Some("m-1"), Some(500), 1.0, 1.0);
        let b = marker(Some("m-2"), Some(500), 1.0, 1.0);
        assert!(a.same_entity(&b));
    }

    #[test]
    fn effective_modified_prefers_last_modified() {
        let mut marking = marker(Some("m-1"), Some(100), 1.0, 1.0);
        marking.last_modified = Some(200);
        assert_eq!(marking.effective_modified(), 200);

        marking.last_modified = None;
        assert_eq!(marking.effective_modified(), 100);

        marking.timestamp = None;
        assert_eq!(marking.effective_modified(), 0);
    }

    #[test]
    fn identity_key_prefers_id() {
        let with_id = marker(Some("m-9"), Some(100), 1.0, 1.0);
        assert_eq!(with_id.identity_key(), "m-9");

        let without = marker(None, Some(100), 35.68941, 139.69217);
        assert_eq!(without.identity_key(), "100:marker:35.6894,139.6922");
    }

    #[test]
    fn deserializes_mixed_timestamp_formats() {
        let json = r#"{
            "type": "marker",
            "lat": 35.0,
            "lng": 139.0,
            "timestamp": "2024-05-01T12:00:00Z",
            "lastModified": "1714564805000"
        }"#;
        let marking: Marking = serde_json::from_str(json).unwrap();
        assert_eq!(marking.timestamp, Some(1_714_564_800_000));
        assert_eq!(marking.last_modified, Some(1_714_564_805_000));
    }

    #[test]
    fn deserializes_malformed_record_without_coordinates() {
        let json = r#"{"type": "polygon", "properties": {"workOrder": "WO-1"}}"#;
        let marking: Marking = serde_json::from_str(json).unwrap();
        assert_eq!(marking.anchor_point(), None);
        assert_eq!(marking.properties.work_order.as_deref(), Some("WO-1"));
    }

    #[test]
    fn origin_round_trips_as_tagged_variant() {
        let uploaded = Origin::Uploaded {
            file_name: "site-a.kmz".to_string(),
        };
        let json = serde_json::to_string(&uploaded).unwrap();
        assert_eq!(json, r#"{"source":"upload","fileName":"site-a.kmz"}"#);

        let manual: Origin = serde_json::from_str(r#"{"source":"manual"}"#).unwrap();
        assert_eq!(manual, Origin::Manual);
    }
}
