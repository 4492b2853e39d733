//! Sync orchestration: fetch, reconcile, garbage-collect, record.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client::SyncClient;
use super::download::{self, DownloadError};
use super::error::{ItemFailure, Result, SyncError};
use super::filename::validate_filename;
use super::gc::{self, GcError};
use super::models::{ManifestItem, SyncReport, SyncStatus};
use super::verify::verify_local;
use crate::observability::Metrics;
use crate::state::JsonFile;

/// Filesystem and concurrency settings of a [`SyncService`]
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub media_dir: PathBuf,
    pub max_parallel_downloads: usize,
    /// Where the last status is persisted; `None` keeps it in memory only
    pub status_file: Option<PathBuf>,
}

#[derive(Debug)]
enum ItemOutcome {
    UpToDate,
    Downloaded,
}

/// A validated manifest entry with its destination and transfer path
struct PlannedItem {
    item: ManifestItem,
    dest: PathBuf,
    temp: PathBuf,
}

/// Keeps the media cache equal to the server manifest.
///
/// At most one sync runs at a time; a second caller gets
/// [`SyncError::AlreadyInProgress`] instead of waiting.
pub struct SyncService {
    client: SyncClient,
    media_dir: PathBuf,
    max_parallel: usize,
    status: Mutex<SyncStatus>,
    status_file: Option<JsonFile>,
    in_flight: Mutex<Option<CancellationToken>>,
    metrics: Arc<Metrics>,
}

/// Clears the in-flight slot however the sync future ends
struct InFlightGuard<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

impl SyncService {
    pub fn new(client: SyncClient, settings: SyncSettings, metrics: Arc<Metrics>) -> Self {
        let status_file = settings.status_file.map(JsonFile::new);

        let status = match status_file.as_ref().map(|file| file.load::<SyncStatus>()) {
            Some(Ok(Some(status))) => status,
            Some(Err(e)) => {
                warn!(error = %e, "Ignoring unreadable sync status");
                SyncStatus::default()
            }
            _ => SyncStatus::default(),
        };

        Self {
            client,
            media_dir: settings.media_dir,
            max_parallel: settings.max_parallel_downloads.max(1),
            status: Mutex::new(status),
            status_file,
            in_flight: Mutex::new(None),
            metrics,
        }
    }

    /// Run one full sync, cancellable through `parent` or [`cancel_sync`](Self::cancel_sync)
    pub async fn trigger_sync(&self, parent: &CancellationToken) -> Result<SyncReport> {
        let cancel = {
            let mut slot = self.in_flight.lock();
            if slot.is_some() {
                return Err(SyncError::AlreadyInProgress);
            }
            let token = parent.child_token();
            *slot = Some(token.clone());
            token
        };
        let _guard = InFlightGuard {
            slot: &self.in_flight,
        };

        self.metrics.sync_started();
        info!(media_dir = %self.media_dir.display(), "Sync started");

        let result = self.run(&cancel).await;
        match &result {
            Ok(report) => info!(
                downloaded = report.downloaded,
                up_to_date = report.up_to_date,
                invalid = report.invalid,
                removed = report.removed,
                "Sync completed"
            ),
            Err(SyncError::Cancelled) => info!("Sync cancelled"),
            Err(e) => error!(error = %e, "Sync failed"),
        }

        self.record(&result).await;
        result
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Cancel the running sync. Returns `false` when none is running.
    pub fn cancel_sync(&self) -> bool {
        match self.in_flight.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        tokio::fs::create_dir_all(&self.media_dir).await?;

        let manifest = self.client.fetch_manifest(cancel).await?;
        debug!(items = manifest.len(), "Manifest fetched");

        let mut report = SyncReport::default();
        let items = self.resolve(manifest, &mut report);
        let expected: HashSet<PathBuf> = items
            .iter()
            .map(|planned| PathBuf::from(&planned.item.filename))
            .collect();

        let root = self.media_dir.clone();
        let keep = expected.clone();
        let swept = tokio::task::spawn_blocking(move || gc::sweep_stale_temps(&root, &keep)).await;
        log_gc("Stale temp sweep", swept);

        let total = items.len();
        let failures = self.reconcile(items, cancel, &mut report).await;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let root = self.media_dir.clone();
        let collected = tokio::task::spawn_blocking(move || gc::collect(&root, &expected)).await;
        report.removed = log_gc("Garbage collection", collected);
        self.metrics.files_removed(report.removed);

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(SyncError::Downloads { total, failures })
        }
    }

    /// Validate manifest filenames, dropping invalid entries and duplicates,
    /// and give every remaining item a temp path no other entry uses
    fn resolve(&self, manifest: Vec<ManifestItem>, report: &mut SyncReport) -> Vec<PlannedItem> {
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(manifest.len());

        for item in manifest {
            let relative = match validate_filename(&item.filename, &self.media_dir) {
                Ok(relative) => relative,
                Err(e) => {
                    warn!(id = %item.id, filename = %item.filename, error = %e, "Skipping manifest entry with invalid filename");
                    report.invalid += 1;
                    continue;
                }
            };

            if !seen.insert(item.filename.clone()) {
                warn!(id = %item.id, filename = %item.filename, "Skipping duplicate manifest entry");
                report.invalid += 1;
                continue;
            }

            items.push((item, self.media_dir.join(relative)));
        }

        // a manifest may list both `clip` and `clip.tmp`
        let mut taken: HashSet<PathBuf> = items.iter().map(|(_, dest)| dest.clone()).collect();
        items
            .into_iter()
            .map(|(item, dest)| {
                let temp = download::temp_path_for(&dest, &taken);
                taken.insert(temp.clone());
                PlannedItem { item, dest, temp }
            })
            .collect()
    }

    /// Verify or download every item with bounded parallelism
    async fn reconcile(
        &self,
        items: Vec<PlannedItem>,
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> Vec<ItemFailure> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks = JoinSet::new();

        for planned in items {
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let cancel = cancel.clone();
            let metrics = self.metrics.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (planned.item.filename, Err(DownloadError::Cancelled)),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (planned.item.filename, Err(DownloadError::Cancelled)),
                    },
                };

                let result = verify_or_download(&client, &planned, &cancel, &metrics).await;
                (planned.item.filename, result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(ItemOutcome::UpToDate))) => report.up_to_date += 1,
                Ok((_, Ok(ItemOutcome::Downloaded))) => report.downloaded += 1,
                Ok((filename, Err(error))) => {
                    if !matches!(error, DownloadError::Cancelled) {
                        warn!(filename = %filename, error = %error, "Download failed");
                    }
                    failures.push(ItemFailure { filename, error });
                }
                Err(e) => {
                    error!(error = %e, "Download task aborted");
                    failures.push(ItemFailure {
                        filename: "<unknown>".to_string(),
                        error: DownloadError::Io(std::io::Error::other(e.to_string())),
                    });
                }
            }
        }

        failures
    }

    async fn record(&self, result: &Result<SyncReport>) {
        let status = SyncStatus {
            last_sync_time: Some(Utc::now()),
            ok: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        };

        self.metrics.sync_finished(status.ok);
        *self.status.lock() = status.clone();

        if let Some(file) = &self.status_file {
            if let Err(e) = file.persist(&status).await {
                warn!(error = %e, "Failed to persist sync status");
            }
        }
    }
}

/// Keep the cached copy when it matches, otherwise download it
async fn verify_or_download(
    client: &SyncClient,
    planned: &PlannedItem,
    cancel: &CancellationToken,
    metrics: &Metrics,
) -> std::result::Result<ItemOutcome, DownloadError> {
    let PlannedItem { item, dest, temp } = planned;

    if verify_local(dest, item).await {
        debug!(filename = %item.filename, "Up to date");
        return Ok(ItemOutcome::UpToDate);
    }
    // hashing a large cached file can outlast a cancel
    if cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    let bytes = download::download(client, item, dest, temp, cancel).await?;
    metrics.file_downloaded(bytes);
    info!(filename = %item.filename, id = %item.id, bytes, "Downloaded");
    Ok(ItemOutcome::Downloaded)
}

/// Log the outcome of a blocking GC pass, returning the removed count
fn log_gc(
    pass: &str,
    joined: std::result::Result<std::result::Result<usize, Vec<GcError>>, tokio::task::JoinError>,
) -> usize {
    match joined {
        Ok(Ok(removed)) => {
            if removed > 0 {
                debug!(removed, "{pass} finished");
            }
            removed
        }
        Ok(Err(errors)) => {
            for e in &errors {
                warn!(error = %e, "{pass} could not remove a file");
            }
            0
        }
        Err(e) => {
            warn!(error = %e, "{pass} task failed");
            0
        }
    }
}
