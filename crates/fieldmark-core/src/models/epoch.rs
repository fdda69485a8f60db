//! Epoch-millisecond normalization for mixed-format producer timestamps.
//!
//! `timestamp` and `lastModified` arrive as numeric epoch millis, numeric
//! strings, or ISO-8601 strings depending on which client wrote the record.
//! Everything funnels through [`normalize`] at deserialization time so the
//! rest of the crate only ever compares `i64` epoch millis.

use serde::{Deserialize, Deserializer};

/// Raw timestamp value as found on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Float(f64),
    Text(String),
}

/// Convert a raw wire timestamp into epoch milliseconds.
///
/// Returns `None` for values that cannot be interpreted; callers treat such
/// records as having no timestamp rather than rejecting them.
#[allow(clippy::cast_possible_truncation)]
pub fn normalize(raw: &RawTimestamp) -> Option<i64> {
    match raw {
        RawTimestamp::Millis(millis) => Some(*millis),
        RawTimestamp::Float(value) if value.is_finite() => Some(*value as i64),
        RawTimestamp::Float(_) => None,
        RawTimestamp::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            if let Ok(millis) = text.parse::<i64>() {
                return Some(millis);
            }
            chrono::DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|parsed| parsed.timestamp_millis())
        }
    }
}

/// Serde helper for `Option<i64>` fields fed by mixed-format producers.
pub fn option<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(normalize))
}
