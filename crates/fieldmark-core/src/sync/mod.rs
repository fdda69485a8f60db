//! Sync orchestration across the backend fallback chain.
//!
//! All triggers funnel through [`SyncOrchestrator::request_sync`], which
//! enforces two gates: a mutual-exclusion flag (one sync in flight, late
//! triggers dropped, never queued) and a minimum interval between sync
//! starts. An in-flight sync always runs to completion; there is no
//! cancellation.

mod adapter;
mod local_http;
pub mod protocol;
mod remote;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;

pub use adapter::BackendAdapter;
pub use local_http::{LocalHttpAdapter, DEFAULT_LOCAL_CANDIDATES};
pub use remote::{RemoteConfig, RemoteStoreAdapter};

use crate::db::{Database, MarkingStore, SqliteMarkingStore};
use crate::error::Result;
use crate::merge::merge_markings;

/// Minimum interval between sync starts.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// Cadence of the automatic timer trigger.
pub const DEFAULT_PERIODIC_INTERVAL: Duration = Duration::from_secs(15);

/// What caused a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Manual,
    Timer,
    Reconnect,
    Focus,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Manual => "manual",
            Self::Timer => "timer",
            Self::Reconnect => "reconnect",
            Self::Focus => "focus",
        })
    }
}

/// Unified sync state exposed to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Synced,
    Offline,
}

/// Why a trigger was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another sync is currently in flight.
    InFlight,
    /// Less than the cooldown has elapsed since the last sync started.
    Cooldown,
}

/// Result of one [`SyncOrchestrator::request_sync`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The trigger was dropped by a gate; nothing happened.
    Skipped(SkipReason),
    /// A backend was reached and the merged collection was stored.
    Completed {
        backend: &'static str,
        total: usize,
        added: usize,
        replaced: usize,
    },
    /// Every backend failed; local data is retained untouched.
    LocalOnly,
}

/// Hook for UI reactions to sync events (map redraw, notifications).
pub trait SyncObserver: Send + Sync {
    fn on_sync_complete(&self, _total: usize, _backend: &str) {}
    fn on_offline_fallback(&self) {}
}

/// Clears the in-flight flag on every exit path, including panics.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Stateful sync controller.
///
/// All mutable sync state lives on the instance, so independent instances
/// (one per database, or per test) never interfere.
pub struct SyncOrchestrator {
    db: Arc<tokio::sync::Mutex<Database>>,
    adapters: Vec<Arc<dyn BackendAdapter>>,
    observers: Vec<Arc<dyn SyncObserver>>,
    cooldown: Duration,
    in_flight: AtomicBool,
    last_started: Mutex<Option<Instant>>,
    state: Mutex<SyncState>,
}

impl SyncOrchestrator {
    /// Create an orchestrator over the given backend preference order.
    #[must_use]
    pub fn new(
        db: Arc<tokio::sync::Mutex<Database>>,
        adapters: Vec<Arc<dyn BackendAdapter>>,
    ) -> Self {
        Self {
            db,
            adapters,
            observers: Vec::new(),
            cooldown: DEFAULT_COOLDOWN,
            in_flight: AtomicBool::new(false),
            last_started: Mutex::new(None),
            state: Mutex::new(SyncState::Idle),
        }
    }

    /// Override the minimum interval between sync starts.
    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Register a sync observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Current state for status displays.
    pub fn state(&self) -> SyncState {
        *self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: SyncState) {
        *self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Attempt a sync, subject to the in-flight and cooldown gates.
    pub async fn request_sync(&self, trigger: SyncTrigger) -> SyncOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(%trigger, "Sync already in flight; dropping trigger");
            return SyncOutcome::Skipped(SkipReason::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        {
            let mut last_started = self
                .last_started
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(started) = *last_started {
                if started.elapsed() < self.cooldown {
                    tracing::debug!(%trigger, "Sync cooldown active; dropping trigger");
                    return SyncOutcome::Skipped(SkipReason::Cooldown);
                }
            }
            *last_started = Some(Instant::now());
        }

        self.set_state(SyncState::Syncing);
        tracing::info!(%trigger, "Starting sync");

        let outcome = self.run_chain().await;
        match &outcome {
            SyncOutcome::Completed { backend, total, .. } => {
                tracing::info!(backend, total, "Sync completed");
                self.set_state(SyncState::Synced);
            }
            SyncOutcome::LocalOnly => {
                tracing::info!("All backends unavailable; keeping local data");
                self.set_state(SyncState::Offline);
            }
            SyncOutcome::Skipped(_) => {}
        }
        outcome
    }

    /// Walk the adapter chain, stopping at the first success.
    async fn run_chain(&self) -> SyncOutcome {
        for adapter in &self.adapters {
            match self.sync_with(adapter.as_ref()).await {
                Ok(outcome) => return outcome,
                Err(error) if error.is_permission_denied() => {
                    tracing::warn!(
                        backend = adapter.name(),
                        %error,
                        "Backend rejected our credentials; check the configured API key"
                    );
                }
                Err(error) => {
                    tracing::warn!(backend = adapter.name(), %error, "Backend unavailable, trying next");
                }
            }
        }

        for observer in &self.observers {
            observer.on_offline_fallback();
        }
        SyncOutcome::LocalOnly
    }

    /// One load → merge → persist → push-back round against one backend.
    async fn sync_with(&self, adapter: &dyn BackendAdapter) -> Result<SyncOutcome> {
        let remote = adapter.load().await?;

        // Read, merge, and write back under one store transaction; the
        // push-back below works from the merged copy, not the store.
        let (merged, added, replaced) = {
            let db = self.db.lock().await;
            let store = SqliteMarkingStore::new(db.connection());
            let local = store.load_all()?;
            let result = merge_markings(&local, &remote);
            store.replace_all(&result.markings)?;
            (result.markings, result.added, result.replaced)
        };

        if let Err(error) = adapter.save(&merged).await {
            // Local state is already durable; the next sync pushes again.
            tracing::warn!(backend = adapter.name(), %error, "Push-back after merge failed");
        }

        for observer in &self.observers {
            observer.on_sync_complete(merged.len(), adapter.name());
        }

        Ok(SyncOutcome::Completed {
            backend: adapter.name(),
            total: merged.len(),
            added,
            replaced,
        })
    }

    /// Fire a sync for an application-foreground event.
    pub async fn handle_focus(&self) -> SyncOutcome {
        self.request_sync(SyncTrigger::Focus).await
    }

    /// Run the periodic trigger loop.
    ///
    /// Ticks every `interval` while `online` reports connectivity and fires
    /// an extra trigger on each offline-to-online edge. Both go through the
    /// usual gates, so bursts collapse into at most one in-flight sync.
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        mut online: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let orchestrator = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *online.borrow() {
                            let _ = orchestrator.request_sync(SyncTrigger::Timer).await;
                        }
                    }
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *online.borrow_and_update() {
                            let _ = orchestrator.request_sync(SyncTrigger::Reconnect).await;
                        }
                    }
                }
            }
        })
    }

    /// Best-effort delete against every configured backend.
    ///
    /// Local deletion is the caller's responsibility; backends that are
    /// offline will converge on the next full sync.
    pub async fn delete_everywhere(&self, id: &str) {
        for adapter in &self.adapters {
            if let Err(error) = adapter.delete(id).await {
                tracing::warn!(backend = adapter.name(), %error, id, "Backend delete failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::Error;
    use crate::models::{Marking, MarkingProperties};

    #[allow(clippy::cast_precision_loss)]
    fn marker(id: &str, modified: i64) -> Marking {
        // Spread markers out so distinct records never coordinate-match.
        let lat = 35.0 + (modified % 1000) as f64 * 0.01;
        let mut marking = Marking::new_marker(lat, 139.0, MarkingProperties::default(), "dev-t");
        marking.id = Some(id.to_string());
        marking.timestamp = Some(modified);
        marking.last_modified = Some(modified);
        marking
    }

    fn shared_db() -> Arc<tokio::sync::Mutex<Database>> {
        Arc::new(tokio::sync::Mutex::new(Database::open_in_memory().unwrap()))
    }

    async fn stored_ids(db: &Arc<tokio::sync::Mutex<Database>>) -> Vec<String> {
        let db = db.lock().await;
        let store = SqliteMarkingStore::new(db.connection());
        let mut ids: Vec<String> = store
            .load_all()
            .unwrap()
            .into_iter()
            .filter_map(|marking| marking.id)
            .collect();
        ids.sort();
        ids
    }

    #[derive(Default)]
    struct FakeAdapter {
        markings: StdMutex<Vec<Marking>>,
        fail_load: bool,
        load_calls: AtomicUsize,
        save_calls: AtomicUsize,
    }

    impl FakeAdapter {
        fn with_markings(markings: Vec<Marking>) -> Self {
            Self {
                markings: StdMutex::new(markings),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail_load: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BackendAdapter for FakeAdapter {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn load(&self) -> crate::error::Result<Vec<Marking>> {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_load {
                return Err(Error::Unavailable("injected failure".to_string()));
            }
            Ok(self.markings.lock().unwrap().clone())
        }

        async fn save(&self, markings: &[Marking]) -> crate::error::Result<()> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            *self.markings.lock().unwrap() = markings.to_vec();
            Ok(())
        }

        async fn delete(&self, _id: &str) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct GatedAdapter {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl BackendAdapter for GatedAdapter {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn load(&self) -> crate::error::Result<Vec<Marking>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Vec::new())
        }

        async fn save(&self, _markings: &[Marking]) -> crate::error::Result<()> {
            Ok(())
        }

        async fn delete(&self, _id: &str) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        completed: AtomicUsize,
        offline: AtomicUsize,
    }

    impl SyncObserver for CountingObserver {
        fn on_sync_complete(&self, _total: usize, _backend: &str) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_offline_fallback(&self) {
            self.offline.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn sync_merges_remote_into_local_and_pushes_back() {
        let db = shared_db();
        {
            let guard = db.lock().await;
            let store = SqliteMarkingStore::new(guard.connection());
            store.upsert(&marker("local", 100)).unwrap();
        }

        let adapter = Arc::new(FakeAdapter::with_markings(vec![marker("remote", 200)]));
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            vec![Arc::clone(&adapter) as Arc<dyn BackendAdapter>],
        );

        let outcome = orchestrator.request_sync(SyncTrigger::Manual).await;
        assert_eq!(
            outcome,
            SyncOutcome::Completed {
                backend: "fake",
                total: 2,
                added: 1,
                replaced: 0,
            }
        );
        assert_eq!(stored_ids(&db).await, vec!["local", "remote"]);
        assert_eq!(adapter.save_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.markings.lock().unwrap().len(), 2);
        assert_eq!(orchestrator.state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn newer_remote_version_wins_locally() {
        let db = shared_db();
        {
            let guard = db.lock().await;
            let store = SqliteMarkingStore::new(guard.connection());
            store.upsert(&marker("m-1", 100)).unwrap();
        }

        let mut newer = marker("m-1", 100);
        newer.last_modified = Some(500);
        newer.properties.product = Some("X".to_string());
        let adapter = Arc::new(FakeAdapter::with_markings(vec![newer]));
        let orchestrator =
            SyncOrchestrator::new(Arc::clone(&db), vec![adapter as Arc<dyn BackendAdapter>]);

        let outcome = orchestrator.request_sync(SyncTrigger::Manual).await;
        assert_eq!(
            outcome,
            SyncOutcome::Completed {
                backend: "fake",
                total: 1,
                added: 0,
                replaced: 1,
            }
        );

        let guard = db.lock().await;
        let store = SqliteMarkingStore::new(guard.connection());
        let stored = store.load_all().unwrap();
        assert_eq!(stored[0].properties.product.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn second_trigger_within_cooldown_is_skipped() {
        let db = shared_db();
        let adapter = Arc::new(FakeAdapter::with_markings(Vec::new()));
        let orchestrator =
            SyncOrchestrator::new(db, vec![Arc::clone(&adapter) as Arc<dyn BackendAdapter>])
                .with_cooldown(Duration::from_secs(3600));

        let first = orchestrator.request_sync(SyncTrigger::Manual).await;
        assert!(matches!(first, SyncOutcome::Completed { .. }));

        let second = orchestrator.request_sync(SyncTrigger::Timer).await;
        assert_eq!(second, SyncOutcome::Skipped(SkipReason::Cooldown));
        assert_eq!(adapter.load_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gate_clears_after_completion_when_cooldown_elapsed() {
        let db = shared_db();
        let adapter = Arc::new(FakeAdapter::with_markings(Vec::new()));
        let orchestrator =
            SyncOrchestrator::new(db, vec![Arc::clone(&adapter) as Arc<dyn BackendAdapter>])
                .with_cooldown(Duration::ZERO);

        assert!(matches!(
            orchestrator.request_sync(SyncTrigger::Manual).await,
            SyncOutcome::Completed { .. }
        ));
        assert!(matches!(
            orchestrator.request_sync(SyncTrigger::Manual).await,
            SyncOutcome::Completed { .. }
        ));
        assert_eq!(adapter.load_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn trigger_during_in_flight_sync_is_dropped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let adapter = Arc::new(GatedAdapter {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        });

        let orchestrator = Arc::new(
            SyncOrchestrator::new(shared_db(), vec![adapter as Arc<dyn BackendAdapter>])
                .with_cooldown(Duration::ZERO),
        );

        let background = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.request_sync(SyncTrigger::Manual).await })
        };

        entered.notified().await;
        let late = orchestrator.request_sync(SyncTrigger::Focus).await;
        assert_eq!(late, SyncOutcome::Skipped(SkipReason::InFlight));

        release.notify_one();
        let first = background.await.unwrap();
        assert!(matches!(first, SyncOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn chain_falls_through_to_next_adapter() {
        let db = shared_db();
        let broken = Arc::new(FakeAdapter::failing());
        let working = Arc::new(FakeAdapter::with_markings(vec![marker("from-lan", 100)]));
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            vec![
                Arc::clone(&broken) as Arc<dyn BackendAdapter>,
                Arc::clone(&working) as Arc<dyn BackendAdapter>,
            ],
        );

        let outcome = orchestrator.request_sync(SyncTrigger::Manual).await;
        assert!(matches!(outcome, SyncOutcome::Completed { total: 1, .. }));
        assert_eq!(stored_ids(&db).await, vec!["from-lan"]);

        // The failed candidate must not also be applied or pushed to.
        assert_eq!(broken.save_calls.load(Ordering::SeqCst), 0);
        assert_eq!(working.save_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_retains_local_data() {
        let db = shared_db();
        {
            let guard = db.lock().await;
            let store = SqliteMarkingStore::new(guard.connection());
            store.upsert(&marker("precious", 100)).unwrap();
        }

        let observer = Arc::new(CountingObserver::default());
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            vec![
                Arc::new(FakeAdapter::failing()) as Arc<dyn BackendAdapter>,
                Arc::new(FakeAdapter::failing()) as Arc<dyn BackendAdapter>,
            ],
        )
        .with_observer(observer.clone());

        let outcome = orchestrator.request_sync(SyncTrigger::Reconnect).await;
        assert_eq!(outcome, SyncOutcome::LocalOnly);
        assert_eq!(stored_ids(&db).await, vec!["precious"]);
        assert_eq!(observer.offline.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.state(), SyncState::Offline);
    }

    #[tokio::test]
    async fn observers_hear_about_completed_syncs() {
        let observer = Arc::new(CountingObserver::default());
        let orchestrator = SyncOrchestrator::new(
            shared_db(),
            vec![Arc::new(FakeAdapter::with_markings(Vec::new())) as Arc<dyn BackendAdapter>],
        )
        .with_observer(observer.clone());

        orchestrator.request_sync(SyncTrigger::Manual).await;
        assert_eq!(observer.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconnect_edge_triggers_sync() {
        let observer = Arc::new(CountingObserver::default());
        let orchestrator = Arc::new(
            SyncOrchestrator::new(
                shared_db(),
                vec![Arc::new(FakeAdapter::with_markings(Vec::new())) as Arc<dyn BackendAdapter>],
            )
            .with_observer(observer.clone())
            .with_cooldown(Duration::ZERO),
        );

        let (online_tx, online_rx) = watch::channel(false);
        let worker = Arc::clone(&orchestrator).spawn_periodic(Duration::from_secs(3600), online_rx);

        online_tx.send(true).unwrap();
        for _ in 0..100 {
            if observer.completed.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(observer.completed.load(Ordering::SeqCst) >= 1);

        worker.abort();
    }
}
