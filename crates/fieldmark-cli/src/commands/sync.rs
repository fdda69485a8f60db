use std::path::Path;
use std::sync::Arc;

use fieldmark_core::sync::{
    SkipReason, SyncObserver, SyncOrchestrator, SyncOutcome, SyncTrigger,
    DEFAULT_PERIODIC_INTERVAL,
};
use tokio::sync::watch;

use crate::commands::common::{build_adapters, open_database};
use crate::error::CliError;
use crate::settings::SyncSettings;

/// Prints user-visible sync notifications, the CLI stand-in for the map UI.
struct ConsoleNotifier;

impl SyncObserver for ConsoleNotifier {
    fn on_sync_complete(&self, total: usize, backend: &str) {
        println!("Markings updated: {total} total (via {backend})");
    }

    fn on_offline_fallback(&self) {
        println!("Offline: all backends unreachable, local data retained");
    }
}

fn build_orchestrator(db_path: Option<&Path>) -> Result<SyncOrchestrator, CliError> {
    let settings = SyncSettings::from_env();
    let adapters = build_adapters(&settings)?;
    let db = Arc::new(tokio::sync::Mutex::new(open_database(db_path)?));
    Ok(SyncOrchestrator::new(db, adapters).with_observer(Arc::new(ConsoleNotifier)))
}

fn report(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Completed {
            backend,
            total,
            added,
            replaced,
        } => {
            println!("Sync completed via {backend}: {total} markings ({added} added, {replaced} updated)");
        }
        SyncOutcome::LocalOnly => println!("Sync finished offline; local data retained"),
        SyncOutcome::Skipped(SkipReason::Cooldown) => println!("Sync skipped: cooldown active"),
        SyncOutcome::Skipped(SkipReason::InFlight) => {
            println!("Sync skipped: another sync is in progress");
        }
    }
}

pub async fn run_sync(db_path: Option<&Path>) -> Result<(), CliError> {
    let orchestrator = build_orchestrator(db_path)?;
    let outcome = orchestrator.request_sync(SyncTrigger::Manual).await;
    report(&outcome);
    Ok(())
}

/// Keep syncing on the periodic cadence until interrupted.
pub async fn run_sync_watch(db_path: Option<&Path>) -> Result<(), CliError> {
    let orchestrator = Arc::new(build_orchestrator(db_path)?);

    // The CLI has no browser connectivity events; assume online and let the
    // adapter chain discover outages.
    let (_online_tx, online_rx) = watch::channel(true);
    let worker = orchestrator.spawn_periodic(DEFAULT_PERIODIC_INTERVAL, online_rx);

    println!(
        "Watching for changes every {}s; press Ctrl-C to stop",
        DEFAULT_PERIODIC_INTERVAL.as_secs()
    );
    tokio::signal::ctrl_c().await?;
    worker.abort();
    println!("Stopped");
    Ok(())
}
