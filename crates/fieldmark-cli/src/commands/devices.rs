use std::path::Path;
use std::sync::Arc;

use fieldmark_core::presence::{PresenceService, PresenceStore};

use crate::commands::common::{
    format_timestamp, load_identity, open_database, parse_lat_lng, remote_adapter,
};
use crate::error::CliError;
use crate::settings::SyncSettings;

pub async fn run_devices(
    announce: Option<&str>,
    as_json: bool,
    db_path: Option<&Path>,
) -> Result<(), CliError> {
    let settings = SyncSettings::from_env();
    let store = Arc::new(remote_adapter(&settings)?) as Arc<dyn PresenceStore>;

    let db = open_database(db_path)?;
    let identity = load_identity(&db);
    let mut service = PresenceService::new(store, identity.id, identity.name, true);

    if let Some(position) = announce {
        let position = parse_lat_lng(position)?;
        service.publish_self(position).await?;
        println!("Announced own position {},{}", position.lat, position.lng);
    }

    service.refresh().await?;
    let mut devices: Vec<_> = service.tracker().active().cloned().collect();
    devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));

    if as_json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No other devices reported in the last 5 minutes.");
        return Ok(());
    }

    for device in &devices {
        println!(
            "{}  {:<24}  {:.5},{:.5}  seen {}",
            device.device_id,
            device.device_name,
            device.lat,
            device.lng,
            format_timestamp(device.timestamp.unwrap_or(0))
        );
    }
    Ok(())
}
