//! Shared helpers for command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fieldmark_core::db::{Database, SqliteMetaStore};
use fieldmark_core::device::{DeviceIdentity, RuntimeContext};
use fieldmark_core::models::LatLng;
use fieldmark_core::sync::{BackendAdapter, LocalHttpAdapter, RemoteStoreAdapter};

use crate::error::CliError;
use crate::settings::SyncSettings;

/// Platform data path used when `--db-path` is not given.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldmark")
        .join("markings.db")
}

pub fn open_database(db_path: Option<&Path>) -> Result<Database, CliError> {
    let path = db_path.map_or_else(default_db_path, Path::to_path_buf);
    Ok(Database::open(path)?)
}

/// Load this install's identity from the database's meta table.
pub fn load_identity(db: &Database) -> DeviceIdentity {
    let meta = SqliteMetaStore::new(db.connection());
    DeviceIdentity::load_or_create(&meta, RuntimeContext::installed_desktop())
}

/// Build the backend preference chain: remote first, then the site LAN.
pub fn build_adapters(settings: &SyncSettings) -> Result<Vec<Arc<dyn BackendAdapter>>, CliError> {
    let mut adapters: Vec<Arc<dyn BackendAdapter>> = Vec::new();
    if let Some(remote) = settings.remote.clone() {
        adapters.push(Arc::new(RemoteStoreAdapter::new(remote)?));
    }
    adapters.push(Arc::new(LocalHttpAdapter::new(&settings.local_candidates)?));
    Ok(adapters)
}

/// Remote presence backend, when configured.
pub fn remote_adapter(settings: &SyncSettings) -> Result<RemoteStoreAdapter, CliError> {
    let config = settings.remote.clone().ok_or(CliError::RemoteNotConfigured)?;
    Ok(RemoteStoreAdapter::new(config)?)
}

/// Parse a `lat,lng` pair in decimal degrees.
pub fn parse_lat_lng(raw: &str) -> Result<LatLng, CliError> {
    fn invalid(raw: &str) -> CliError {
        CliError::InvalidCoordinate(raw.to_string())
    }

    let (lat, lng) = raw.split_once(',').ok_or_else(|| invalid(raw))?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid(raw))?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid(raw))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid(raw));
    }
    Ok(LatLng::new(lat, lng))
}

/// Render epoch millis as local-naive UTC for table output.
pub fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| "-".to_string(), |ts| ts.format("%Y-%m-%d %H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_lat_lng_accepts_decimal_pairs() {
        let point = parse_lat_lng("35.6894, 139.6917").unwrap();
        assert_eq!(point, LatLng::new(35.6894, 139.6917));
    }

    #[test]
    fn parse_lat_lng_rejects_garbage() {
        assert!(parse_lat_lng("35.6894").is_err());
        assert!(parse_lat_lng("north,east").is_err());
        assert!(parse_lat_lng("95.0,139.0").is_err());
        assert!(parse_lat_lng("35.0,181.0").is_err());
    }

    #[test]
    fn format_timestamp_renders_utc_minutes() {
        assert_eq!(format_timestamp(1_714_564_800_000), "2024-05-01 12:00");
        assert_eq!(format_timestamp(i64::MAX), "-");
    }
}
