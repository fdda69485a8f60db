use std::path::Path;

use fieldmark_core::db::{MarkingStore, SqliteMarkingStore};
use fieldmark_core::works::group_by_work_order;

use crate::commands::common::{format_timestamp, open_database};
use crate::error::CliError;

pub fn run_works(as_json: bool, db_path: Option<&Path>) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = SqliteMarkingStore::new(db.connection());
    let works = group_by_work_order(&store.load_all()?);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&works)?);
        return Ok(());
    }

    if works.is_empty() {
        println!("No work orders found.");
        return Ok(());
    }

    for work in &works {
        let products = if work.products.is_empty() {
            "-".to_string()
        } else {
            work.products.join(", ")
        };
        println!(
            "{}  {:>3} markings  last {}  products: {}",
            work.work_order,
            work.marking_count,
            format_timestamp(work.last_modified),
            products
        );
    }
    Ok(())
}
