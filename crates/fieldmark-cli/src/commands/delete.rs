use std::path::Path;
use std::sync::Arc;

use fieldmark_core::db::{MarkingStore, SqliteMarkingStore};
use fieldmark_core::sync::SyncOrchestrator;

use crate::commands::common::{build_adapters, open_database};
use crate::error::CliError;
use crate::settings::SyncSettings;

pub async fn run_delete(id: &str, db_path: Option<&Path>) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    {
        let store = SqliteMarkingStore::new(db.connection());
        if !store.delete(id)? {
            return Err(CliError::MarkingNotFound(id.to_string()));
        }
    }

    // Backends that are unreachable will converge on the next sync.
    let settings = SyncSettings::from_env();
    let adapters = build_adapters(&settings)?;
    let orchestrator = SyncOrchestrator::new(Arc::new(tokio::sync::Mutex::new(db)), adapters);
    orchestrator.delete_everywhere(id).await;

    println!("Deleted marking {id}");
    Ok(())
}
