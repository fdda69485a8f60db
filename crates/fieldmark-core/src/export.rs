//! Shared marking export helpers for CLI and server parity.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{Marking, MarkingKind};
use crate::util::unix_timestamp_millis;

/// Export output format shared by all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    GeoJson,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::GeoJson => "geojson",
        }
    }
}

/// Envelope for plain JSON exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport {
    pub exported_at: i64,
    pub count: usize,
    pub markings: Vec<Marking>,
}

/// Render markings as a pretty-printed JSON envelope.
pub fn render_json_export(markings: &[Marking]) -> serde_json::Result<String> {
    let export = JsonExport {
        exported_at: unix_timestamp_millis(),
        count: markings.len(),
        markings: markings.to_vec(),
    };
    serde_json::to_string_pretty(&export)
}

/// Render markings as a GeoJSON `FeatureCollection`.
///
/// Circles become point features carrying a `radius` property; records
/// without usable geometry are skipped.
pub fn render_geojson_export(markings: &[Marking]) -> serde_json::Result<String> {
    let features: Vec<Value> = markings.iter().filter_map(feature_for).collect();
    serde_json::to_string_pretty(&json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

fn feature_for(marking: &Marking) -> Option<Value> {
    let geometry = geometry_for(marking)?;

    let mut properties = serde_json::to_value(&marking.properties).ok()?;
    if let Some(map) = properties.as_object_mut() {
        if let Some(id) = &marking.id {
            map.insert("id".to_string(), json!(id));
        }
        map.insert("markingType".to_string(), json!(marking.kind.as_str()));
        if let Some(radius) = marking.radius_m {
            map.insert("radius".to_string(), json!(radius));
        }
        if let Some(timestamp) = marking.timestamp {
            map.insert("timestamp".to_string(), json!(timestamp));
        }
    }

    Some(json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": properties,
    }))
}

// GeoJSON positions are [lng, lat].
fn geometry_for(marking: &Marking) -> Option<Value> {
    match marking.kind {
        MarkingKind::Marker | MarkingKind::Circle => {
            let anchor = marking.anchor_point()?;
            Some(json!({"type": "Point", "coordinates": [anchor.lng, anchor.lat]}))
        }
        MarkingKind::Polyline => {
            let vertices = marking.coordinates.as_ref()?;
            let positions: Vec<[f64; 2]> = vertices.iter().map(|v| [v.lng, v.lat]).collect();
            Some(json!({"type": "LineString", "coordinates": positions}))
        }
        MarkingKind::Polygon | MarkingKind::Rectangle => {
            let vertices = marking.coordinates.as_ref()?;
            if vertices.is_empty() {
                return None;
            }
            let mut ring: Vec<[f64; 2]> = vertices.iter().map(|v| [v.lng, v.lat]).collect();
            if ring.first() != ring.last() {
                ring.push(ring[0]);
            }
            Some(json!({"type": "Polygon", "coordinates": [ring]}))
        }
    }
}

/// Render markings based on selected export format.
pub fn render_markings_export(
    markings: &[Marking],
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(markings),
        ExportFormat::GeoJson => render_geojson_export(markings),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("fieldmark-export-{timestamp_ms}.{}", format.extension())
}
