use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{Result, ScheduleError};
use super::store::ScheduleStore;
use super::times::{calculate_next_sync_time, normalize};
use crate::clock::TimeOfDay;
use crate::sync::{SyncError, SyncService};

/// Source of the current local time
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// State shared with the background loop
struct Shared {
    sync: Arc<SyncService>,
    times: Mutex<Vec<TimeOfDay>>,
    reload: Notify,
    running: AtomicBool,
    idle_poll: Duration,
    clock: Clock,
}

struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Fires [`SyncService::trigger_sync`] at the configured daily times
pub struct Scheduler {
    shared: Arc<Shared>,
    store: Option<ScheduleStore>,
    handle: Mutex<Option<LoopHandle>>,
    // serializes persist-then-apply of concurrent updates
    update: tokio::sync::Mutex<()>,
}

impl Scheduler {
    /// Create a stopped scheduler, loading the persisted schedule from
    /// `schedule_file` when given
    pub fn new(sync: Arc<SyncService>, schedule_file: Option<PathBuf>, idle_poll: Duration) -> Self {
        Self::with_clock(sync, schedule_file, idle_poll, Arc::new(Local::now))
    }

    /// [`new`](Self::new) with the wall clock replaced by `clock`
    pub fn with_clock(
        sync: Arc<SyncService>,
        schedule_file: Option<PathBuf>,
        idle_poll: Duration,
        clock: Clock,
    ) -> Self {
        let store = schedule_file.map(ScheduleStore::new);
        let times = store.as_ref().map(ScheduleStore::load).unwrap_or_default();
        debug!(entries = times.len(), "Sync schedule loaded");

        Self {
            shared: Arc::new(Shared {
                sync,
                times: Mutex::new(times),
                reload: Notify::new(),
                running: AtomicBool::new(false),
                idle_poll,
                clock,
            }),
            store,
            handle: Mutex::new(None),
            update: tokio::sync::Mutex::new(()),
        }
    }

    /// Spawn the scheduling loop. No-op while it is already running.
    pub fn start(&self, parent: &CancellationToken) {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            debug!("Scheduler already running");
            return;
        }

        let cancel = parent.child_token();
        self.shared.running.store(true, Ordering::SeqCst);
        let task = tokio::spawn(run_loop(self.shared.clone(), cancel.clone()));
        *handle = Some(LoopHandle { cancel, task });
    }

    /// Stop the loop and wait for it to exit. Safe to call when not running.
    pub async fn stop(&self) {
        let Some(LoopHandle { cancel, task }) = self.handle.lock().take() else {
            return;
        };

        cancel.cancel();
        if let Err(e) = task.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
        self.shared.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Replace the schedule. Every entry must be valid; nothing is persisted
    /// or applied otherwise. Returns the normalized schedule.
    pub async fn set_schedule<S: AsRef<str>>(&self, times: &[S]) -> Result<Vec<TimeOfDay>> {
        let times = normalize(times)?;
        let _update = self.update.lock().await;

        if let Some(store) = &self.store {
            store.persist(&times).await.map_err(ScheduleError::State)?;
        }

        *self.shared.times.lock() = times.clone();
        self.shared.reload.notify_one();
        info!(times = ?times.iter().map(ToString::to_string).collect::<Vec<_>>(), "Sync schedule updated");
        Ok(times)
    }

    pub fn schedule(&self) -> Vec<TimeOfDay> {
        self.shared.times.lock().clone()
    }
}

async fn run_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    info!("Scheduler started");
    let mut last_fired: Option<DateTime<Local>> = None;

    loop {
        let times = shared.times.lock().clone();
        let now = (shared.clock)();
        // never fire the same instant twice, even if the wall clock lags the timer
        let after = match last_fired {
            Some(fired) if fired > now => fired,
            _ => now,
        };

        let next = calculate_next_sync_time(&times, &after);
        let wait = match &next {
            Some(at) => {
                debug!(next = %at, "Next scheduled sync");
                (*at - now).to_std().unwrap_or_default()
            }
            None => shared.idle_poll,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = shared.reload.notified() => {
                debug!("Schedule changed, recomputing");
                continue;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let Some(fired) = next else {
            continue;
        };
        last_fired = Some(fired);

        match shared.sync.trigger_sync(&cancel).await {
            Ok(_) => {}
            Err(SyncError::AlreadyInProgress) => {
                info!("Scheduled sync skipped, another sync is running");
            }
            Err(SyncError::Cancelled) if cancel.is_cancelled() => break,
            Err(e) => warn!(error = %e, "Scheduled sync failed"),
        }
    }

    shared.running.store(false, Ordering::SeqCst);
    info!("Scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Metrics;
    use crate::sync::{ClientConfig, SyncClient, SyncSettings};
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct Fixture {
        scheduler: Scheduler,
        sync: Arc<SyncService>,
        metrics: Arc<Metrics>,
    }

    fn build_with(temp: &TempDir, client: ClientConfig, clock: Clock) -> Fixture {
        let metrics = Arc::new(Metrics::new());
        let sync = Arc::new(SyncService::new(
            SyncClient::new(client).unwrap(),
            SyncSettings {
                media_dir: temp.path().join("media"),
                max_parallel_downloads: 1,
                status_file: None,
            },
            metrics.clone(),
        ));
        let scheduler = Scheduler::with_clock(
            sync.clone(),
            Some(temp.path().join("schedule.json")),
            Duration::from_secs(3600),
            clock,
        );
        Fixture {
            scheduler,
            sync,
            metrics,
        }
    }

    fn build(temp: &TempDir) -> Scheduler {
        build_with(temp, ClientConfig::default(), Arc::new(Local::now)).scheduler
    }

    /// Wall-speed clock that reads `lead` before noon today when created
    fn clock_before_noon(lead: Duration) -> Clock {
        let noon = Local::now().date_naive().and_hms_opt(12, 0, 0).unwrap();
        let noon = Local.from_local_datetime(&noon).earliest().unwrap();
        let offset = (noon - chrono::Duration::from_std(lead).unwrap()) - Local::now();
        Arc::new(move || Local::now() + offset)
    }

    /// Accepts connections and never answers, keeping a sync in flight
    async fn silent_core() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        format!("http://{addr}")
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn rendered(times: &[TimeOfDay]) -> Vec<String> {
        times.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_start_stop_are_idempotent() {
        let temp = TempDir::new().unwrap();
        let scheduler = build(&temp);
        let root = CancellationToken::new();

        assert!(!scheduler.is_running());
        scheduler.stop().await;

        scheduler.start(&root);
        scheduler.start(&root);
        assert!(scheduler.is_running());

        scheduler.stop().await;
        assert!(!scheduler.is_running());
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        scheduler.start(&root);
        assert!(scheduler.is_running());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_loop() {
        let temp = TempDir::new().unwrap();
        let scheduler = build(&temp);
        let root = CancellationToken::new();

        scheduler.start(&root);
        root.cancel();

        tokio::time::timeout(Duration::from_secs(5), async {
            while scheduler.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_set_schedule_persists_normalized_times() {
        let temp = TempDir::new().unwrap();
        let scheduler = build(&temp);

        let applied = scheduler.set_schedule(&["15:30", "3:00", "03:00"]).await.unwrap();
        assert_eq!(rendered(&applied), vec!["03:00", "15:30"]);
        assert_eq!(scheduler.schedule(), applied);

        let reloaded = build(&temp);
        assert_eq!(rendered(&reloaded.schedule()), vec!["03:00", "15:30"]);
    }

    #[tokio::test]
    async fn test_invalid_schedule_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let scheduler = build(&temp);
        scheduler.set_schedule(&["08:00"]).await.unwrap();

        let err = scheduler.set_schedule(&["09:00", "9am"]).await.unwrap_err();

        assert!(matches!(err, ScheduleError::InvalidTimeFormat(_)));
        assert_eq!(rendered(&scheduler.schedule()), vec!["08:00"]);
        let raw = std::fs::read_to_string(temp.path().join("schedule.json")).unwrap();
        assert!(!raw.contains("09:00"));
    }

    #[tokio::test]
    async fn test_schedule_update_while_running() {
        let temp = TempDir::new().unwrap();
        let scheduler = build(&temp);
        let root = CancellationToken::new();

        scheduler.start(&root);
        scheduler.set_schedule(&["04:00"]).await.unwrap();
        scheduler.set_schedule(Vec::<String>::new().as_slice()).await.unwrap();
        assert!(scheduler.is_running());
        assert!(scheduler.schedule().is_empty());

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_fires_at_scheduled_time_once() {
        let temp = TempDir::new().unwrap();
        let fx = build_with(&temp, ClientConfig::default(), clock_before_noon(Duration::from_millis(300)));
        fx.scheduler.set_schedule(&["12:00"]).await.unwrap();
        let root = CancellationToken::new();

        fx.scheduler.start(&root);
        wait_for(|| fx.sync.status().last_sync_time.is_some()).await;

        // no core API configured, so the sync itself fails
        assert!(!fx.sync.status().ok);
        assert_eq!(fx.metrics.snapshot().syncs_started, 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fx.metrics.snapshot().syncs_started, 1);
        assert!(fx.scheduler.is_running());

        fx.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_reload_recomputes_next_trigger() {
        let temp = TempDir::new().unwrap();
        let fx = build_with(&temp, ClientConfig::default(), clock_before_noon(Duration::from_secs(1)));
        let root = CancellationToken::new();

        // empty schedule: the loop is parked on the one hour idle poll
        fx.scheduler.start(&root);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.metrics.snapshot().syncs_started, 0);

        fx.scheduler.set_schedule(&["12:00"]).await.unwrap();
        wait_for(|| fx.metrics.snapshot().syncs_started == 1).await;

        fx.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_running_manual_sync_is_skipped() {
        let temp = TempDir::new().unwrap();
        let client = ClientConfig {
            core_api_base: Some(silent_core().await),
            ..ClientConfig::default()
        };
        let fx = build_with(&temp, client, clock_before_noon(Duration::from_secs(1)));
        fx.scheduler.set_schedule(&["12:00"]).await.unwrap();

        let manual = {
            let sync = fx.sync.clone();
            tokio::spawn(async move { sync.trigger_sync(&CancellationToken::new()).await })
        };
        wait_for(|| fx.sync.is_sync_in_progress()).await;

        let root = CancellationToken::new();
        fx.scheduler.start(&root);
        tokio::time::sleep(Duration::from_secs(2)).await;

        // the trigger at noon hit the running manual sync and was dropped
        assert_eq!(fx.metrics.snapshot().syncs_started, 1);
        assert!(fx.scheduler.is_running());
        assert!(fx.sync.is_sync_in_progress());

        assert!(fx.sync.cancel_sync());
        let result = manual.await.unwrap();
        assert!(matches!(result, Err(SyncError::Cancelled)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.metrics.snapshot().syncs_started, 1);
        assert!(fx.scheduler.is_running());

        fx.scheduler.stop().await;
        assert!(!fx.scheduler.is_running());
    }
}
