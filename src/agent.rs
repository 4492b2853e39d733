//! The device agent: one sync service, one scheduler, one rest-window manager

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::observability::Metrics;
use crate::rest::{CronCommands, CrontabIo, RestWindows, SystemCrontab};
use crate::schedule::Scheduler;
use crate::sync::{ClientConfig, FetchError, SyncClient, SyncService, SyncSettings};

const REST_DESCRIPTION: &str = "maintenance window";

pub struct Agent {
    pub sync: Arc<SyncService>,
    pub scheduler: Scheduler,
    pub rest: RestWindows,
    pub metrics: Arc<Metrics>,
    shutdown: CancellationToken,
}

impl Agent {
    /// Build an agent that manages the configured user's crontab
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let crontab = Arc::new(SystemCrontab::new(&config.rest.crontab_user));
        Self::with_crontab(config, crontab)
    }

    /// Build an agent over an arbitrary crontab backend
    pub fn with_crontab(config: &Config, crontab: Arc<dyn CrontabIo>) -> Result<Self, FetchError> {
        let metrics = Arc::new(Metrics::new());

        let client = SyncClient::new(ClientConfig {
            core_api_base: config.sync.core_api_base.clone(),
            device_key: config.sync.device_key.clone(),
            device_key_header: config.sync.device_key_header.clone(),
            connect_timeout: config.sync.connect_timeout(),
            request_timeout: config.sync.request_timeout(),
            user_agent: config.sync.user_agent.clone(),
        })?;

        let sync = Arc::new(SyncService::new(
            client,
            SyncSettings {
                media_dir: config.sync.media_dir.clone(),
                max_parallel_downloads: config.sync.max_parallel_downloads,
                status_file: Some(config.sync.status_file()),
            },
            metrics.clone(),
        ));

        let scheduler = Scheduler::new(
            sync.clone(),
            Some(config.sync.schedule_file()),
            config.sync.idle_poll(),
        );

        let commands = CronCommands::new(
            &config.rest.stop_command(),
            &config.rest.start_command(),
            REST_DESCRIPTION,
        );
        let rest = RestWindows::new(crontab, commands);

        Ok(Self {
            sync,
            scheduler,
            rest,
            metrics,
            shutdown: CancellationToken::new(),
        })
    }

    /// Root token; every sync and the scheduler loop derive from it
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn start(&self) {
        self.scheduler.start(&self.shutdown);
    }

    /// Cancel any running sync and wait for the scheduler to exit
    pub async fn shutdown(&self) {
        info!("Shutting down agent");
        self.shutdown.cancel();
        self.scheduler.stop().await;
    }
}
