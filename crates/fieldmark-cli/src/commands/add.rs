use std::path::Path;

use fieldmark_core::db::{MarkingStore, SqliteMarkingStore};
use fieldmark_core::models::{Marking, MarkingProperties};

use crate::commands::common::{load_identity, open_database, parse_lat_lng};
use crate::error::CliError;

pub struct AddArgs {
    pub position: String,
    pub work_order: Option<String>,
    pub product: Option<String>,
    pub measurement: Option<String>,
    pub description: Option<String>,
}

pub fn run_add(args: AddArgs, db_path: Option<&Path>) -> Result<(), CliError> {
    let position = parse_lat_lng(&args.position)?;
    let db = open_database(db_path)?;
    let identity = load_identity(&db);

    let properties = MarkingProperties {
        work_order: args.work_order,
        product: args.product,
        measurement: args.measurement,
        description: args.description,
        date: Some(chrono::Utc::now().format("%Y-%m-%d").to_string()),
        ..MarkingProperties::default()
    };

    let marking = Marking::new_marker(position.lat, position.lng, properties, identity.id);
    let store = SqliteMarkingStore::new(db.connection());
    store.upsert(&marking)?;

    println!("Added marking {}", marking.identity_key());
    Ok(())
}
